use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::kernel::BasePushNotificationService;

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo Push Notification Client
/// Delivers donor and receiver notifications to the mobile app
pub struct ExpoClient {
    client: Client,
    push_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
    sound: &'static str,
    priority: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    id: Option<String>,
    message: Option<String>,
}

impl ExpoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self::with_url(EXPO_PUSH_URL, access_token)
    }

    pub fn with_url(push_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            push_url: push_url.into(),
            access_token,
        }
    }
}

#[async_trait]
impl BasePushNotificationService for ExpoClient {
    /// Send a push notification to an Expo push token, returning the ticket id
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<String> {
        let message = ExpoMessage {
            to: push_token,
            title,
            body,
            data,
            sound: "default",
            priority: "high",
        };

        let mut request = self.client.post(&self.push_url).json(&message);

        // Add access token if provided (for higher rate limits)
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            error!("Expo push failed {}: {}", status, body);
            anyhow::bail!("Expo push API error {}: {}", status, body);
        }

        let ticket = response.json::<ExpoResponse>().await?.data;

        if ticket.status != "ok" {
            error!("Expo ticket error: {:?}", ticket);
            anyhow::bail!(
                "Expo ticket error: {}",
                ticket.message.unwrap_or_else(|| ticket.status.clone())
            );
        }

        info!("Expo notification accepted");
        Ok(ticket.id.unwrap_or_default())
    }
}

//! Operator CLI: publish a blood request and fan it out to matching donors.
//!
//! Profiles and the request come from JSON files and are loaded into an
//! in-process store, so the fan-out can be replayed or previewed without
//! touching production data. Prints a JSON summary on stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bloodbridge_core::common::utils::ExpoClient;
use bloodbridge_core::common::{SystemClock, UserId};
use bloodbridge_core::config::Config;
use bloodbridge_core::domains::notifications::NotificationDispatcher;
use bloodbridge_core::domains::requests::{publish_request, RequestDraft};
use bloodbridge_core::kernel::{
    BaseDocumentStore, BasePushNotificationService, Collection, EngineDeps, Fields,
    InMemoryDocumentStore, MemoryProfileCache,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notify_donors")]
#[command(about = "Publish a blood request and notify matching donors")]
struct Cli {
    /// JSON file holding the request (camelCase fields plus `ownerId`)
    #[arg(long)]
    request: PathBuf,

    /// JSON file holding an array of profiles, each with an `id`
    #[arg(long)]
    profiles: PathBuf,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFile {
    owner_id: UserId,
    #[serde(flatten)]
    draft: RequestDraft,
}

#[derive(Deserialize)]
struct ProfileRecord {
    id: UserId,
    #[serde(flatten)]
    fields: Fields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    request_id: String,
    dry_run: bool,
    candidates: usize,
    sent: usize,
    failed: usize,
    skipped_owner: usize,
    skipped_no_address: usize,
    skipped_duplicate: usize,
    delivery_ids: Vec<String>,
}

/// Push sender that only logs.
#[derive(Default)]
struct DryRunSender {
    sent: AtomicUsize,
}

#[async_trait]
impl BasePushNotificationService for DryRunSender {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        _data: serde_json::Value,
    ) -> Result<String> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(push_token = %push_token, title = %title, body = %body, "[dry-run] would notify");
        Ok(format!("dry-run-{}", n))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bloodbridge_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load config")?;

    let request: RequestFile = read_json(&cli.request)?;
    let profiles: Vec<ProfileRecord> = read_json(&cli.profiles)?;

    let store = Arc::new(InMemoryDocumentStore::new());
    for profile in &profiles {
        store
            .put(
                Collection::Profiles,
                &profile.id.document_key(),
                profile.fields.clone(),
                false,
            )
            .await
            .with_context(|| format!("Failed to seed profile {}", profile.id))?;
    }
    tracing::info!(profiles = profiles.len(), "Seeded profiles");

    let push_service: Arc<dyn BasePushNotificationService> = if cli.dry_run {
        Arc::new(DryRunSender::default())
    } else {
        Arc::new(ExpoClient::with_url(
            config.expo_push_url.clone(),
            config.expo_access_token.clone(),
        ))
    };

    let deps = EngineDeps::new(
        store,
        push_service,
        Arc::new(MemoryProfileCache::new()),
        Arc::new(SystemClock),
        config.engine,
    );
    let dispatcher = NotificationDispatcher::new(deps.clone());

    let published = publish_request(request.owner_id, request.draft, &deps, &dispatcher)
        .await
        .context("Failed to publish request")?;

    let report = published
        .dispatch
        .context("Request stored but donor fan-out failed")?;

    let summary = Summary {
        request_id: published.request.id.to_string(),
        dry_run: cli.dry_run,
        candidates: report.candidates,
        sent: report.sent,
        failed: report.failed,
        skipped_owner: report.skipped_owner,
        skipped_no_address: report.skipped_no_address,
        skipped_duplicate: report.skipped_duplicate,
        delivery_ids: report.delivery_ids,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

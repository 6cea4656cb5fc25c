use anyhow::{Context, Result};
use chrono::Duration;
use dotenvy::dotenv;
use std::env;

use crate::common::utils::EXPO_PUSH_URL;

/// Minimum spacing between two mark-all-seen passes.
pub const DEFAULT_SEEN_DEBOUNCE_SECS: i64 = 3;

/// How long a sent notification suppresses an identical one.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 60;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub expo_access_token: Option<String>,
    pub expo_push_url: String,
    pub engine: EngineConfig,
}

/// Tunables of the matching and notification engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub seen_debounce: Duration,
    pub dedup_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seen_debounce: Duration::seconds(DEFAULT_SEEN_DEBOUNCE_SECS),
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            expo_access_token: env::var("EXPO_ACCESS_TOKEN").ok(),
            expo_push_url: env::var("EXPO_PUSH_URL")
                .unwrap_or_else(|_| EXPO_PUSH_URL.to_string()),
            engine: EngineConfig {
                seen_debounce: Duration::seconds(seconds_var(
                    "SEEN_DEBOUNCE_SECS",
                    DEFAULT_SEEN_DEBOUNCE_SECS,
                )?),
                dedup_window: Duration::seconds(seconds_var(
                    "NOTIFICATION_DEDUP_WINDOW_SECS",
                    DEFAULT_DEDUP_WINDOW_SECS,
                )?),
            },
        })
    }
}

fn seconds_var(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(raw) => {
            let secs: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", name))?;
            anyhow::ensure!(secs >= 0, "{} must not be negative", name);
            Ok(secs)
        }
        Err(_) => Ok(default),
    }
}

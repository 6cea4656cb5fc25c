use thiserror::Error;

use super::UserId;

/// Failures surfaced by the matching and notification engine.
///
/// Incomplete records are never an error: the completeness gate defers them
/// silently. Nothing here is retried inside the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Profile not found for user {0}; profile must be completed first")]
    ProfileNotFound(UserId),

    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("Live query failed: {0}")]
    Subscription(String),

    #[error("Write failed during {action}: {source}")]
    WriteFailure {
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Notification to {recipient} failed: {source}")]
    Dispatch {
        recipient: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub fn write(action: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::WriteFailure { action, source }
    }

    /// True for failures the UI should offer a retry for.
    pub fn is_retryable_action(&self) -> bool {
        matches!(self, Self::WriteFailure { .. } | Self::Store(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

use sha2::{Digest, Sha256};
use std::fmt;

use crate::common::{RequestId, UserId};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A new request matching the recipient's blood group and city
    NewRequest,
    /// A donor answered the recipient's request
    ResponseReceived,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewRequest => "new_request",
            Self::ResponseReceived => "response_received",
        }
    }
}

/// Deterministic dedup key for one notification attempt.
///
/// SHA256 of `kind|request|donor`, so the same (kind, request, donor)
/// always maps to the same key. Only held in memory for the dedup window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey(String);

impl NotificationKey {
    pub fn derive(kind: NotificationKind, request_id: RequestId, donor_id: Option<UserId>) -> Self {
        let donor = donor_id.map(|d| d.document_key()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(request_id.document_key().as_bytes());
        hasher.update(b"|");
        hasher.update(donor.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

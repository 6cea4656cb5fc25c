//! Profile loading and donor/receiver classification.
//!
//! A user's role is inferred from history: someone with at least as many
//! donation records as request records (and at least one) is a donor,
//! everyone else a receiver. The result is cached for the session.

use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::{Role, UserProfile};
use crate::common::{EngineError, EngineResult, UserId};
use crate::kernel::{Collection, EngineDeps, Fields, Query};

/// Historical record counts used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub donations: usize,
    pub requests: usize,
}

/// Classify a user from their record counts.
///
/// Ties with a non-zero count go to donor; a user with no history at all
/// is a receiver.
pub fn classify(counts: RoleCounts) -> Role {
    if counts.donations > 0 && counts.donations >= counts.requests {
        Role::Donor
    } else {
        Role::Receiver
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub profile: UserProfile,
    pub role: Role,
    pub counts: RoleCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileResolution {
    /// No profile document; no role may be assigned and no feed started.
    NoProfile,
    Resolved(ResolvedProfile),
}

pub struct ProfileResolver {
    deps: EngineDeps,
    sessions: RwLock<HashMap<UserId, ResolvedProfile>>,
}

impl ProfileResolver {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            deps,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Load the profile and classify the user. Read-only.
    pub async fn resolve(&self, user_id: UserId) -> EngineResult<ProfileResolution> {
        if let Some(cached) = self.sessions.read().await.get(&user_id) {
            return Ok(ProfileResolution::Resolved(cached.clone()));
        }

        let store = &self.deps.store;
        let Some(doc) = store
            .get(Collection::Profiles, &user_id.document_key())
            .await?
        else {
            info!(user_id = %user_id, "No profile document; classification skipped");
            return Ok(ProfileResolution::NoProfile);
        };
        let profile = UserProfile::from_fields(user_id, &doc.fields)?;

        let counts = RoleCounts {
            donations: store
                .count(&Query::new(Collection::Donations).where_eq("donorId", user_id))
                .await?,
            requests: store
                .count(&Query::new(Collection::Requests).where_eq("ownerId", user_id))
                .await?,
        };
        let role = classify(counts);
        debug!(
            user_id = %user_id,
            donations = counts.donations,
            requests = counts.requests,
            role = %role,
            "Classified user"
        );

        let resolved = ResolvedProfile {
            profile,
            role,
            counts,
        };
        self.sessions
            .write()
            .await
            .insert(user_id, resolved.clone());
        Ok(ProfileResolution::Resolved(resolved))
    }

    /// Like [`resolve`](Self::resolve) but a missing profile is an error.
    pub async fn require(&self, user_id: UserId) -> EngineResult<ResolvedProfile> {
        match self.resolve(user_id).await? {
            ProfileResolution::Resolved(resolved) => Ok(resolved),
            ProfileResolution::NoProfile => Err(EngineError::ProfileNotFound(user_id)),
        }
    }

    /// Drop the session classification so the next resolve recomputes it.
    pub async fn invalidate(&self, user_id: UserId) {
        self.sessions.write().await.remove(&user_id);
    }

    /// Last-known profile snapshot, for rendering before the first fetch lands.
    pub async fn cached_profile(&self, user_id: UserId) -> Option<UserProfile> {
        match self.deps.profile_cache.load(user_id).await {
            Ok(Some(fields)) => UserProfile::from_fields(user_id, &fields).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile cache read failed");
                None
            }
        }
    }

    /// Move the user to a new city and refresh the cached snapshot.
    pub async fn update_location(&self, user_id: UserId, city: &str) -> EngineResult<UserProfile> {
        let city = city.trim();
        if city.is_empty() {
            return Err(EngineError::InvalidRecord("city must not be blank".into()));
        }

        let store = &self.deps.store;
        let key = user_id.document_key();
        let Some(doc) = store.get(Collection::Profiles, &key).await? else {
            return Err(EngineError::ProfileNotFound(user_id));
        };

        let mut patch = Fields::new();
        patch.insert("city".into(), json!(city));
        store
            .put(Collection::Profiles, &key, patch, true)
            .await
            .map_err(EngineError::write("update profile location"))?;

        let mut fields = doc.fields;
        fields.insert("city".into(), json!(city));
        let profile = UserProfile::from_fields(user_id, &fields)?;

        self.invalidate(user_id).await;
        if let Err(e) = self.deps.profile_cache.store(user_id, fields).await {
            warn!(user_id = %user_id, error = %e, "Profile cache refresh failed");
        }

        info!(user_id = %user_id, city = %city, "Profile location updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_history_is_receiver() {
        assert_eq!(classify(RoleCounts::default()), Role::Receiver);
    }

    #[test]
    fn test_more_donations_is_donor() {
        let counts = RoleCounts {
            donations: 3,
            requests: 1,
        };
        assert_eq!(classify(counts), Role::Donor);
    }

    #[test]
    fn test_more_requests_is_receiver() {
        let counts = RoleCounts {
            donations: 1,
            requests: 2,
        };
        assert_eq!(classify(counts), Role::Receiver);
    }

    #[test]
    fn test_nonzero_tie_is_donor() {
        let counts = RoleCounts {
            donations: 2,
            requests: 2,
        };
        assert_eq!(classify(counts), Role::Donor);
    }
}

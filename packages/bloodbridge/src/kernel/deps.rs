//! Engine dependencies (using traits for testability)
//!
//! The central dependency container handed to every domain service. All
//! external collaborators sit behind trait objects so tests can swap them.

use std::sync::Arc;

use crate::common::Clock;
use crate::config::EngineConfig;
use crate::kernel::{BaseDocumentStore, BaseProfileCache, BasePushNotificationService};

#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn BaseDocumentStore>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    /// Last-known profile snapshot, read before the first profile fetch resolves
    pub profile_cache: Arc<dyn BaseProfileCache>,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
}

impl EngineDeps {
    pub fn new(
        store: Arc<dyn BaseDocumentStore>,
        push_service: Arc<dyn BasePushNotificationService>,
        profile_cache: Arc<dyn BaseProfileCache>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            push_service,
            profile_cache,
            clock,
            config,
        }
    }
}

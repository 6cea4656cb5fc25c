//! Process-local profile snapshot cache.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::Fields;
use super::traits::BaseProfileCache;
use crate::common::UserId;

/// In-memory [`BaseProfileCache`]. Cloneable; clones share entries.
#[derive(Clone, Default)]
pub struct MemoryProfileCache {
    entries: Arc<RwLock<HashMap<UserId, Fields>>>,
}

impl MemoryProfileCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseProfileCache for MemoryProfileCache {
    async fn load(&self, user_id: UserId) -> Result<Option<Fields>> {
        Ok(self.entries.read().await.get(&user_id).cloned())
    }

    async fn store(&self, user_id: UserId, fields: Fields) -> Result<()> {
        self.entries.write().await.insert(user_id, fields);
        Ok(())
    }
}

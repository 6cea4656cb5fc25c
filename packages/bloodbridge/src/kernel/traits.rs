// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no matching logic.
// Matching, gating and dispatch live in domains/ and use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseDocumentStore)

use anyhow::Result;
use async_trait::async_trait;

use super::store::{Collection, Document, Fields, Query, Subscription, Update, Write};
use crate::common::UserId;

// =============================================================================
// Document Store Trait (Infrastructure - CRUD + live queries)
// =============================================================================

#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    /// Fetch a single document
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Apply a batch of writes atomically
    async fn commit(&self, writes: Vec<Write>) -> Result<()>;

    /// Run a one-shot equality query
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Open a live query; the current snapshot is delivered first
    async fn subscribe(&self, query: Query) -> Result<Subscription>;

    /// Count documents matching a query
    async fn count(&self, query: &Query) -> Result<usize> {
        Ok(self.query(query).await?.len())
    }

    /// Write a single document (merge = partial update)
    async fn put(&self, collection: Collection, id: &str, fields: Fields, merge: bool) -> Result<()> {
        self.commit(vec![Write::Put {
            collection,
            id: id.to_string(),
            fields,
            merge,
        }])
        .await
    }

    /// Apply field ops to a single existing document
    async fn update(&self, update: Update) -> Result<()> {
        self.commit(vec![Write::Update(update)]).await
    }
}

// =============================================================================
// Push Notification Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Send a push notification to a push token, returning the provider's delivery id
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<String>;
}

// =============================================================================
// Profile Cache Trait (Infrastructure - last-known profile snapshot)
// =============================================================================

#[async_trait]
pub trait BaseProfileCache: Send + Sync {
    /// Load the cached profile fields for a user
    async fn load(&self, user_id: UserId) -> Result<Option<Fields>>;

    /// Replace the cached profile fields for a user
    async fn store(&self, user_id: UserId, fields: Fields) -> Result<()>;
}

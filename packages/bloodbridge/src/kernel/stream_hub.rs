//! In-process change feed for live queries.
//!
//! Collection-keyed broadcast channels. The in-memory store publishes one
//! [`Change`] per committed document write; live-query pumps subscribe to the
//! collection they watch and re-run their query on every change.
//!
//! # Usage
//!
//! Producers (store writes):
//!   hub.publish(Collection::Requests, change).await;
//!
//! Consumers (live-query pumps):
//!   let rx = hub.subscribe(Collection::Requests).await;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::store::Collection;

/// A committed write to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub document_id: String,
    /// Store-wide commit counter at the time of the write.
    pub version: u64,
}

/// Collection-keyed pub/sub hub.
///
/// Thread-safe, cloneable. A lagging receiver only loses intermediate
/// notices, never the fact that something changed.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<Collection, broadcast::Sender<Change>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (256 notices per collection).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a change. No-op if nobody watches the collection.
    pub async fn publish(&self, collection: Collection, change: Change) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&collection) {
            // Ignore send errors (no active receivers)
            let _ = tx.send(change);
        }
    }

    /// Watch a collection. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, collection: Collection) -> broadcast::Receiver<Change> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// Number of live receivers on a collection.
    pub async fn watcher_count(&self, collection: Collection) -> usize {
        self.channels
            .read()
            .await
            .get(&collection)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into EngineDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::store::{Collection, Document, Query, Subscription, Write};
use super::{
    BaseDocumentStore, BasePushNotificationService, EngineDeps, InMemoryDocumentStore,
    MemoryProfileCache,
};
use crate::common::ManualClock;
use crate::config::EngineConfig;

// =============================================================================
// Mock Push Notification Service
// =============================================================================

/// A notification captured by [`MockPushNotificationService`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub push_token: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

pub struct MockPushNotificationService {
    sent_notifications: Arc<Mutex<Vec<SentNotification>>>,
    failing_tokens: Arc<Mutex<HashSet<String>>>,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self {
            sent_notifications: Arc::new(Mutex::new(Vec::new())),
            failing_tokens: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make every send to `push_token` fail
    pub fn failing_for(self, push_token: &str) -> Self {
        self.failing_tokens
            .lock()
            .unwrap()
            .insert(push_token.to_string());
        self
    }

    /// Get all notifications that were sent
    pub fn sent_notifications(&self) -> Vec<SentNotification> {
        self.sent_notifications.lock().unwrap().clone()
    }

    /// Tokens that received at least one notification, in send order
    pub fn recipients(&self) -> Vec<String> {
        self.sent_notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.push_token.clone())
            .collect()
    }

    /// Check if a notification was sent with the given title
    pub fn was_sent_with_title(&self, title: &str) -> bool {
        self.sent_notifications
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.title == title)
    }
}

impl Default for MockPushNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<String> {
        if self.failing_tokens.lock().unwrap().contains(push_token) {
            anyhow::bail!("DeviceNotRegistered: {}", push_token);
        }

        let mut sent = self.sent_notifications.lock().unwrap();
        sent.push(SentNotification {
            push_token: push_token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data,
        });
        Ok(format!("ticket-{}", sent.len()))
    }
}

// =============================================================================
// Flaky Store (fault injection around any store)
// =============================================================================

/// Wraps a store, counting writes and failing them on demand.
pub struct FlakyStore {
    inner: Arc<dyn BaseDocumentStore>,
    fail_writes: AtomicBool,
    fail_queries: AtomicBool,
    commits: AtomicUsize,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn BaseDocumentStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of individual writes inside successful commits
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseDocumentStore for FlakyStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("injected write failure");
        }
        let count = writes.len();
        self.inner.commit(writes).await?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.writes.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            anyhow::bail!("injected query failure");
        }
        self.inner.query(query).await
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription> {
        self.inner.subscribe(query).await
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Everything a test needs: deps plus handles onto the doubles behind them.
pub struct TestDependencies {
    pub memory: InMemoryDocumentStore,
    pub store: Arc<FlakyStore>,
    pub push: Arc<MockPushNotificationService>,
    pub profile_cache: MemoryProfileCache,
    pub clock: ManualClock,
    pub config: EngineConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self::with_push(MockPushNotificationService::new())
    }

    pub fn with_push(push: MockPushNotificationService) -> Self {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let memory = InMemoryDocumentStore::with_clock(Arc::new(clock.clone()));
        let store = Arc::new(FlakyStore::new(Arc::new(memory.clone())));
        Self {
            memory,
            store,
            push: Arc::new(push),
            profile_cache: MemoryProfileCache::new(),
            clock,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the deps handed to domain services
    pub fn deps(&self) -> EngineDeps {
        EngineDeps::new(
            self.store.clone(),
            self.push.clone(),
            Arc::new(self.profile_cache.clone()),
            Arc::new(self.clock.clone()),
            self.config,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

//! Test harness over the in-memory store, mock push service and manual clock.

use bloodbridge_core::domains::matching::FeedView;
use bloodbridge_core::kernel::test_dependencies::MockPushNotificationService;
use bloodbridge_core::kernel::{EngineDeps, InMemoryDocumentStore, TestDependencies};
use std::time::Duration;
use tokio::sync::watch;

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh doubles per test; nothing is shared between tests.
pub struct TestHarness {
    pub deps: TestDependencies,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            deps: TestDependencies::new(),
        }
    }

    pub fn with_push(push: MockPushNotificationService) -> Self {
        init_tracing();
        Self {
            deps: TestDependencies::with_push(push),
        }
    }

    pub fn engine_deps(&self) -> EngineDeps {
        self.deps.deps()
    }

    /// The store behind the flaky wrapper; writes here are not counted.
    pub fn store(&self) -> &InMemoryDocumentStore {
        &self.deps.memory
    }

    /// Let spawned live-query tasks run.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Wait until the feed satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_view(
    rx: &mut watch::Receiver<FeedView>,
    predicate: impl FnMut(&FeedView) -> bool,
) -> FeedView {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for feed view")
        .expect("feed channel closed")
        .clone()
}

//! Live feed for one screen.
//!
//! The engine owns at most one store subscription at a time. A spawned pump
//! turns each snapshot into a [`FeedView`] and publishes it on a watch
//! channel. Blur, parameter changes and drop tear the pump down; a torn-down
//! session can never write to the view again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{CommitOutcome, FeedState, FeedView, OptimisticRemoval};
use super::views::{compute_view, FeedParams};
use crate::common::{EngineError, EngineResult, RequestId};
use crate::domains::profiles::Role;
use crate::kernel::{BaseDocumentStore, Document, SnapshotEvent, Subscription};

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MatchQueryEngine {
    store: Arc<dyn BaseDocumentStore>,
    state: Arc<Mutex<FeedState>>,
    view_tx: Arc<watch::Sender<FeedView>>,
    params: Mutex<Option<FeedParams>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MatchQueryEngine {
    pub fn new(store: Arc<dyn BaseDocumentStore>) -> Self {
        let (view_tx, _) = watch::channel(FeedView::uninitialized());
        Self {
            store,
            state: Arc::new(Mutex::new(FeedState::new())),
            view_tx: Arc::new(view_tx),
            params: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    /// Subscribe for `params`. Different parameters discard the current view;
    /// the same parameters keep it on screen until the first new snapshot.
    pub async fn start(&self, params: FeedParams) -> EngineResult<()> {
        self.stop().await;

        let reset = {
            let mut current = self.params.lock().unwrap_or_else(|e| e.into_inner());
            let changed = current.as_ref() != Some(&params);
            *current = Some(params.clone());
            changed
        };

        let generation = {
            let mut state = lock(&self.state);
            let generation = state.begin(params.role, reset);
            self.view_tx.send_replace(state.view.clone());
            generation
        };

        let subscription = match self.store.subscribe(params.query()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                lock(&self.state).end();
                return Err(EngineError::Subscription(e.to_string()));
            }
        };

        info!(
            user_id = %params.user_id,
            role = %params.role,
            generation,
            "Feed subscription started"
        );

        let handle = tokio::spawn(pump(
            subscription,
            params,
            generation,
            self.state.clone(),
            self.view_tx.clone(),
        ));
        *self.pump.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Tear the subscription down. Returns once the pump is gone.
    pub async fn stop(&self) {
        lock(&self.state).end();
        let handle = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            debug!("Feed subscription stopped");
        }
    }

    /// Screen regained focus: resubscribe with the last parameters.
    pub async fn on_focus(&self) -> EngineResult<()> {
        let params = self.params();
        match params {
            Some(params) if !self.is_active() => self.start(params).await,
            _ => Ok(()),
        }
    }

    pub async fn on_blur(&self) {
        self.stop().await;
    }

    /// Resubscribe if the parameters changed.
    pub async fn set_params(&self, params: FeedParams) -> EngineResult<()> {
        if self.params().as_ref() == Some(&params) && self.is_active() {
            return Ok(());
        }
        self.start(params).await
    }

    pub fn params(&self) -> Option<FeedParams> {
        self.params.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).is_active()
    }

    pub fn view(&self) -> FeedView {
        self.view_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeedView> {
        self.view_tx.subscribe()
    }

    /// Drop a request from the donor feed before its write lands.
    pub fn hide_request(&self, request_id: RequestId) -> Option<OptimisticRemoval> {
        if self.params()?.role != Role::Donor {
            return None;
        }
        let mut state = lock(&self.state);
        let removal = state.hide(request_id);
        self.view_tx.send_replace(state.view.clone());
        Some(removal)
    }

    /// Roll back [`hide_request`](Self::hide_request) after a failed write.
    pub fn restore_request(&self, removal: &OptimisticRemoval) {
        let Some(params) = self.params() else {
            return;
        };
        let mut state = lock(&self.state);
        state.restore(removal, |docs: &[Document], hidden: &HashSet<RequestId>| {
            compute_view(&params, docs, hidden)
        });
        self.view_tx.send_replace(state.view.clone());
        debug!(request_id = %removal.request_id, "Optimistic removal rolled back");
    }
}

impl Drop for MatchQueryEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

async fn pump(
    mut subscription: Subscription,
    params: FeedParams,
    generation: u64,
    state: Arc<Mutex<FeedState>>,
    view_tx: Arc<watch::Sender<FeedView>>,
) {
    while let Some(event) = subscription.next().await {
        match event {
            SnapshotEvent::Snapshot(docs) => {
                let Some((seq, hidden)) = lock(&state).issue(generation) else {
                    break;
                };
                let computed = compute_view(&params, &docs, &hidden);
                let deferred = computed.deferred;

                let outcome = lock(&state).commit(generation, seq, docs, computed);
                match outcome {
                    CommitOutcome::Applied(view) => {
                        debug!(
                            generation,
                            seq,
                            items = view.items.len(),
                            unseen = view.unseen_count,
                            deferred,
                            "Feed updated"
                        );
                        view_tx.send_replace(view);
                    }
                    CommitOutcome::Deferred => {
                        debug!(generation, seq, deferred, "Snapshot held back until records complete");
                    }
                    CommitOutcome::Stale => {
                        debug!(generation, seq, "Discarded out-of-order snapshot");
                    }
                    CommitOutcome::Inactive => break,
                }
            }
            SnapshotEvent::Error(message) => {
                warn!(generation, error = %message, "Live query error; keeping last good data");
                match lock(&state).record_error(generation, message) {
                    Some(view) => {
                        view_tx.send_replace(view);
                    }
                    None => break,
                }
            }
        }
    }
    debug!(generation, "Feed pump exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;
    use crate::domains::matching::FeedStatus;
    use crate::kernel::{Collection, InMemoryDocumentStore};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn params(role: Role) -> FeedParams {
        FeedParams {
            user_id: UserId::new(),
            role,
            blood_group: "O+".into(),
            city: "Chennai".into(),
        }
    }

    async fn ready(engine: &MatchQueryEngine) -> FeedView {
        let mut rx = engine.watch();
        let ready = rx.wait_for(|v| v.status == FeedStatus::Ready);
        let view = tokio::time::timeout(Duration::from_secs(1), ready)
            .await
            .unwrap()
            .unwrap()
            .clone();
        view
    }

    #[tokio::test]
    async fn test_start_publishes_loading_then_ready() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = MatchQueryEngine::new(store.clone());

        assert_ok!(engine.start(params(Role::Donor)).await);
        assert!(engine.is_active());

        let view = ready(&engine).await;
        assert_eq!(view.role, Some(Role::Donor));
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_stop_closes_store_subscription() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = MatchQueryEngine::new(store.clone());
        assert_ok!(engine.start(params(Role::Donor)).await);
        assert_eq!(store.open_subscriptions(), 1);

        engine.stop().await;

        assert!(!engine.is_active());
        assert_eq!(store.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_new_params_reset_view() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = MatchQueryEngine::new(store.clone());
        let donor = params(Role::Donor);
        store
            .put(
                Collection::Requests,
                &RequestId::new().document_key(),
                json!({"bloodGroup": "O+", "city": "Chennai", "purpose": "Surgery", "status": "pending"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                false,
            )
            .await
            .unwrap();

        assert_ok!(engine.start(donor.clone()).await);
        assert_eq!(ready(&engine).await.items.len(), 1);

        let elsewhere = FeedParams {
            city: "Madurai".into(),
            ..donor
        };
        assert_ok!(engine.set_params(elsewhere).await);

        assert_eq!(engine.view().status, FeedStatus::Loading);
        assert!(engine.view().items.is_empty());
        assert!(ready(&engine).await.items.is_empty());
        assert_eq!(store.open_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_receiver_feed_ignores_hide() {
        let engine = MatchQueryEngine::new(Arc::new(InMemoryDocumentStore::new()));
        assert_ok!(engine.start(params(Role::Receiver)).await);

        assert!(engine.hide_request(RequestId::new()).is_none());
    }
}

use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;

use super::engine::MatchQueryEngine;
use super::state::FeedView;
use super::views::FeedParams;
use crate::common::{EngineError, EngineResult, RequestId, UserId};
use crate::domains::notifications::NotificationDispatcher;
use crate::domains::profiles::{ProfileResolver, ResolvedProfile, Role};
use crate::domains::requests::models::{DonorResponse, ResponseStatus};
use crate::domains::responses::ResponseLedger;
use crate::domains::seen::{MarkSeenOutcome, SeenStateTracker};
use crate::kernel::EngineDeps;

/// One user's feed screen: role resolution, live feed, responding and
/// seen-marking behind a single handle.
pub struct MatchingSession {
    user_id: UserId,
    resolver: ProfileResolver,
    engine: Arc<MatchQueryEngine>,
    ledger: ResponseLedger,
    tracker: SeenStateTracker,
    resolved: RwLock<Option<ResolvedProfile>>,
}

impl MatchingSession {
    pub fn new(
        deps: EngineDeps,
        user_id: UserId,
        dispatcher: Option<Arc<NotificationDispatcher>>,
    ) -> Self {
        let engine = Arc::new(MatchQueryEngine::new(deps.store.clone()));
        let mut ledger = ResponseLedger::new(deps.clone()).with_feed(engine.clone());
        if let Some(dispatcher) = dispatcher {
            ledger = ledger.with_dispatcher(dispatcher);
        }
        Self {
            user_id,
            resolver: ProfileResolver::new(deps.clone()),
            engine,
            ledger,
            tracker: SeenStateTracker::new(deps),
            resolved: RwLock::new(None),
        }
    }

    /// Resolve the user's role and start the feed.
    ///
    /// Fails with `ProfileNotFound` before anything is subscribed when the
    /// user has no profile yet.
    pub async fn mount(&self) -> EngineResult<ResolvedProfile> {
        let resolved = self.resolver.require(self.user_id).await?;
        self.engine.set_params(FeedParams::from_resolved(&resolved)).await?;
        info!(user_id = %self.user_id, role = %resolved.role, "Feed mounted");
        *self.resolved.write().await = Some(resolved.clone());
        Ok(resolved)
    }

    /// Resubscribe and mark the feed seen. Rapid refocus is absorbed by the
    /// seen tracker's debounce.
    pub async fn on_focus(&self) -> EngineResult<MarkSeenOutcome> {
        self.engine.on_focus().await?;
        self.mark_all_seen().await
    }

    pub async fn on_blur(&self) {
        self.engine.on_blur().await;
    }

    pub async fn respond(
        &self,
        request_id: RequestId,
        decision: ResponseStatus,
    ) -> EngineResult<DonorResponse> {
        let resolved = self.resolved().await?;
        if resolved.role != Role::Donor {
            return Err(EngineError::InvalidRecord(
                "only donors can respond to requests".into(),
            ));
        }
        self.ledger
            .respond(request_id, &resolved.profile, decision)
            .await
    }

    pub async fn mark_all_seen(&self) -> EngineResult<MarkSeenOutcome> {
        let resolved = self.resolved().await?;
        self.tracker
            .mark_all_seen(&FeedParams::from_resolved(&resolved))
            .await
    }

    /// Move the user to another city; the feed follows.
    pub async fn relocate(&self, city: &str) -> EngineResult<ResolvedProfile> {
        self.resolver.update_location(self.user_id, city).await?;
        self.mount().await
    }

    pub fn view(&self) -> FeedView {
        self.engine.view()
    }

    pub fn watch(&self) -> watch::Receiver<FeedView> {
        self.engine.watch()
    }

    pub fn engine(&self) -> &MatchQueryEngine {
        &self.engine
    }

    async fn resolved(&self) -> EngineResult<ResolvedProfile> {
        self.resolved
            .read()
            .await
            .clone()
            .ok_or(EngineError::ProfileNotFound(self.user_id))
    }
}

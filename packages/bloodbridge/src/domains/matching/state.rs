use std::collections::HashSet;

use super::views::{sort_by_deadline, ComputedView, FeedItems, MatchedRequest};
use crate::common::RequestId;
use crate::domains::profiles::Role;
use crate::kernel::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Uninitialized,
    Loading,
    Ready,
}

/// What the UI renders: role-tagged, sorted, gated items plus the badge count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub status: FeedStatus,
    pub role: Option<Role>,
    pub items: FeedItems,
    pub unseen_count: usize,
    /// Last live-query failure; cleared by the next applied snapshot
    pub last_error: Option<String>,
}

impl FeedView {
    pub fn uninitialized() -> Self {
        Self {
            status: FeedStatus::Uninitialized,
            role: None,
            items: FeedItems::Requests(Vec::new()),
            unseen_count: 0,
            last_error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FeedStatus::Loading
    }

    pub fn requests(&self) -> &[MatchedRequest] {
        match &self.items {
            FeedItems::Requests(items) => items,
            FeedItems::Responses(_) => &[],
        }
    }

    pub fn responses(&self) -> &[super::views::ResponseItem] {
        match &self.items {
            FeedItems::Responses(items) => items,
            FeedItems::Requests(_) => &[],
        }
    }
}

/// Result of offering a computed snapshot to the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Applied(FeedView),
    /// Everything was held back by the gate; the current view is kept as is
    Deferred,
    /// An older snapshot finished after a newer one
    Stale,
    /// The subscription was torn down
    Inactive,
}

/// A request removed from the donor feed ahead of its write.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticRemoval {
    pub request_id: RequestId,
    pub item: Option<MatchedRequest>,
}

/// Mutable feed state, guarded by the engine's mutex.
///
/// Every live-query session gets a generation; snapshots carry the
/// generation they were received under plus a sequence number, and are
/// dropped if either is out of date.
#[derive(Debug)]
pub(crate) struct FeedState {
    pub view: FeedView,
    generation: u64,
    active: bool,
    issued_seq: u64,
    applied_seq: u64,
    hidden: HashSet<RequestId>,
    last_docs: Option<Vec<Document>>,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            view: FeedView::uninitialized(),
            generation: 0,
            active: false,
            issued_seq: 0,
            applied_seq: 0,
            hidden: HashSet::new(),
            last_docs: None,
        }
    }

    /// Open a new session. With `reset`, previously displayed data is discarded.
    pub fn begin(&mut self, role: Role, reset: bool) -> u64 {
        self.generation += 1;
        self.active = true;
        self.issued_seq = 0;
        self.applied_seq = 0;
        if reset || self.view.role != Some(role) {
            self.view = FeedView {
                status: FeedStatus::Loading,
                role: Some(role),
                items: FeedItems::empty_for(role),
                unseen_count: 0,
                last_error: None,
            };
            self.hidden.clear();
            self.last_docs = None;
        } else if self.view.status == FeedStatus::Uninitialized {
            self.view.status = FeedStatus::Loading;
        }
        self.generation
    }

    /// Close the current session; in-flight work from it becomes inert.
    pub fn end(&mut self) {
        self.generation += 1;
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }

    /// Claim the next sequence number for a snapshot received under `generation`.
    pub fn issue(&mut self, generation: u64) -> Option<(u64, HashSet<RequestId>)> {
        if !self.accepts(generation) {
            return None;
        }
        self.issued_seq += 1;
        Some((self.issued_seq, self.hidden.clone()))
    }

    pub fn commit(
        &mut self,
        generation: u64,
        seq: u64,
        docs: Vec<Document>,
        computed: ComputedView,
    ) -> CommitOutcome {
        if !self.accepts(generation) {
            return CommitOutcome::Inactive;
        }
        if seq <= self.applied_seq {
            return CommitOutcome::Stale;
        }
        self.applied_seq = seq;

        // Nothing surfaced only because records are still propagating: keep
        // whatever is on screen (or keep loading) until a later snapshot.
        if computed.items.is_empty() && computed.deferred > 0 {
            return CommitOutcome::Deferred;
        }

        // Removals are kept until the snapshot no longer offers the request.
        self.hidden.retain(|id| computed.open_request_ids.contains(id));

        let items = computed.items.without_hidden(&self.hidden);
        self.view.unseen_count = items.unseen_count();
        self.view.items = items;
        self.view.status = FeedStatus::Ready;
        self.view.last_error = None;
        self.last_docs = Some(docs);
        CommitOutcome::Applied(self.view.clone())
    }

    pub fn record_error(&mut self, generation: u64, message: String) -> Option<FeedView> {
        if !self.accepts(generation) {
            return None;
        }
        self.view.last_error = Some(message);
        Some(self.view.clone())
    }

    /// Hide a request from the donor feed immediately.
    pub fn hide(&mut self, request_id: RequestId) -> OptimisticRemoval {
        self.hidden.insert(request_id);
        let mut item = None;
        if let FeedItems::Requests(items) = &mut self.view.items {
            if let Some(pos) = items.iter().position(|i| i.request.id == request_id) {
                item = Some(items.remove(pos));
            }
        }
        self.view.unseen_count = self.view.items.unseen_count();
        OptimisticRemoval { request_id, item }
    }

    /// Undo [`hide`](Self::hide), re-deriving the list from the last applied snapshot.
    pub fn restore(
        &mut self,
        removal: &OptimisticRemoval,
        recompute: impl FnOnce(&[Document], &HashSet<RequestId>) -> ComputedView,
    ) {
        self.hidden.remove(&removal.request_id);
        if let Some(docs) = &self.last_docs {
            let computed = recompute(docs, &self.hidden);
            self.view.unseen_count = computed.unseen_count;
            self.view.items = computed.items;
        } else if let Some(item) = &removal.item {
            if let FeedItems::Requests(items) = &mut self.view.items {
                items.push(item.clone());
                sort_by_deadline(items);
            }
            self.view.unseen_count = self.view.items.unseen_count();
        }
    }
}

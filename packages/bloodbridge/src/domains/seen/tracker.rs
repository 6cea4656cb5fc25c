//! Seen-state marking.
//!
//! Donor feed: the donor's id is unioned into `seenBy` on every surfaced
//! request still missing it. Receiver feed: `seenByReceiver` is patched to
//! true on unseen responses, one write per request document. All writes of
//! one call go out as a single batch.

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::debounce::MinIntervalGate;
use crate::common::{EngineError, EngineResult};
use crate::domains::matching::FeedParams;
use crate::domains::profiles::Role;
use crate::domains::requests::gate::CompletenessGate;
use crate::domains::requests::models::RawBloodRequest;
use crate::kernel::{Collection, Document, EngineDeps, FieldOp, Fields, Update, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSeenOutcome {
    /// Inside the debounce window of the previous completed call
    Debounced,
    Marked {
        /// Documents written
        writes: usize,
        /// Requests (donor) or responses (receiver) flipped to seen
        items: usize,
    },
}

pub struct SeenStateTracker {
    deps: EngineDeps,
    gate: Mutex<MinIntervalGate>,
}

impl SeenStateTracker {
    pub fn new(deps: EngineDeps) -> Self {
        let gate = MinIntervalGate::new(deps.config.seen_debounce);
        Self {
            deps,
            gate: Mutex::new(gate),
        }
    }

    /// Mark everything currently in the feed as seen.
    ///
    /// Calls are serialized; a call within the debounce interval of the last
    /// completed one does nothing. A failed write does not move the window.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, role = %params.role))]
    pub async fn mark_all_seen(&self, params: &FeedParams) -> EngineResult<MarkSeenOutcome> {
        let mut gate = self.gate.lock().await;
        if !gate.is_open(self.deps.clock.now()) {
            debug!("Mark-seen debounced");
            return Ok(MarkSeenOutcome::Debounced);
        }

        let docs = self.deps.store.query(&params.query()).await?;
        let (writes, items) = match params.role {
            Role::Donor => donor_writes(&docs, params),
            Role::Receiver => receiver_writes(&docs),
        };

        let count = writes.len();
        if count > 0 {
            self.deps
                .store
                .commit(writes)
                .await
                .map_err(EngineError::write("mark feed seen"))?;
            info!(writes = count, items, "Feed marked seen");
        }

        gate.record(self.deps.clock.now());
        Ok(MarkSeenOutcome::Marked {
            writes: count,
            items,
        })
    }
}

fn donor_writes(docs: &[Document], params: &FeedParams) -> (Vec<Write>, usize) {
    let donor_key = params.user_id.document_key();
    let writes: Vec<Write> = docs
        .iter()
        .filter_map(RawBloodRequest::from_document)
        .filter(|raw| !raw.has_response_from(params.user_id))
        .filter(|raw| !raw.is_seen_by(params.user_id))
        .filter(|raw| CompletenessGate::admit_request(raw).is_some())
        .map(|raw| {
            Write::Update(
                Update::new(Collection::Requests, raw.id)
                    .array_union("seenBy", vec![json!(donor_key)]),
            )
        })
        .collect();
    let items = writes.len();
    (writes, items)
}

fn receiver_writes(docs: &[Document]) -> (Vec<Write>, usize) {
    let mut writes = Vec::new();
    let mut items = 0;

    for raw in docs.iter().filter_map(RawBloodRequest::from_document) {
        let mut keys: Vec<Value> = Vec::new();
        for response in raw.raw_responses() {
            if response.seen_by_receiver || response.donor_id.trim().is_empty() {
                continue;
            }
            items += 1;
            let key = json!(response.donor_id);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            continue;
        }

        let mut patch = Fields::new();
        patch.insert("seenByReceiver".into(), json!(true));
        writes.push(Write::Update(Update::new(Collection::Requests, raw.id).op(
            "responses",
            FieldOp::PatchArrayElements {
                key_field: "donorId".into(),
                keys,
                patch,
            },
        )));
    }
    (writes, items)
}

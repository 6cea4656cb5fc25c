//! Accept/decline responses.
//!
//! The response is appended with an array union and the donor is unioned
//! into `seenBy`; nothing is read-modify-written, so concurrent donors on the
//! same request all keep their entries. Two accepts race on `status` and the
//! last write wins.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::common::{DonationId, EngineError, EngineResult, RequestId};
use crate::domains::matching::MatchQueryEngine;
use crate::domains::notifications::NotificationDispatcher;
use crate::domains::profiles::UserProfile;
use crate::domains::requests::gate::CompletenessGate;
use crate::domains::requests::models::{
    DonorResponse, RawBloodRequest, RequestStatus, ResponseStatus,
};
use crate::kernel::{Collection, EngineDeps, Fields, Update, Write};

pub struct ResponseLedger {
    deps: EngineDeps,
    feed: Option<Arc<MatchQueryEngine>>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
}

impl ResponseLedger {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            deps,
            feed: None,
            dispatcher: None,
        }
    }

    /// Remove answered requests from this donor feed ahead of the write.
    pub fn with_feed(mut self, feed: Arc<MatchQueryEngine>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Notify request owners once a response is stored.
    pub fn with_dispatcher(mut self, dispatcher: Arc<NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[instrument(skip(self, donor), fields(donor_id = %donor.id))]
    pub async fn respond(
        &self,
        request_id: RequestId,
        donor: &UserProfile,
        decision: ResponseStatus,
    ) -> EngineResult<DonorResponse> {
        let key = request_id.document_key();
        let Some(doc) = self.deps.store.get(Collection::Requests, &key).await? else {
            return Err(EngineError::NotFound {
                collection: Collection::Requests.as_str(),
                id: key,
            });
        };

        let now = self.deps.clock.now();
        let response = DonorResponse {
            donor_id: donor.id,
            donor_name: donor.name.clone(),
            donor_mobile: donor.mobile.clone(),
            donor_blood_group: donor.blood_group.clone(),
            donor_city: donor.city.clone(),
            status: decision,
            responded_at: Some(now),
            seen_by_receiver: false,
        };

        let mut update = Update::new(Collection::Requests, key.clone())
            .array_union("responses", vec![response.to_value()])
            .array_union("seenBy", vec![json!(donor.id.document_key())])
            .server_timestamp("updatedAt");
        let mut writes = Vec::with_capacity(2);
        if decision == ResponseStatus::Accepted {
            update = update
                .set("status", RequestStatus::Accepted.as_str())
                .set("respondedBy", donor.name.as_str());
            writes.push(Write::Put {
                collection: Collection::Donations,
                id: DonationId::new().document_key(),
                fields: donation_fields(&response, request_id),
                merge: false,
            });
        }
        writes.insert(0, Write::Update(update));

        let removal = self
            .feed
            .as_ref()
            .and_then(|feed| feed.hide_request(request_id));

        if let Err(e) = self.deps.store.commit(writes).await {
            if let (Some(feed), Some(removal)) = (&self.feed, &removal) {
                feed.restore_request(removal);
            }
            warn!(request_id = %request_id, error = %e, "Response write failed");
            return Err(EngineError::write("record donor response")(e));
        }

        info!(request_id = %request_id, decision = %decision, "Donor response recorded");

        if let Some(dispatcher) = &self.dispatcher {
            let request = RawBloodRequest::from_document(&doc)
                .as_ref()
                .and_then(CompletenessGate::admit_request);
            match request {
                Some(request) => {
                    if let Err(e) = dispatcher.notify_request_owner(&request, &response).await {
                        warn!(request_id = %request_id, error = %e, "Owner notification failed");
                    }
                }
                None => debug!(request_id = %request_id, "Request incomplete; owner not notified"),
            }
        }

        Ok(response)
    }
}

fn donation_fields(response: &DonorResponse, request_id: RequestId) -> Fields {
    let value = json!({
        "donorId": response.donor_id.document_key(),
        "requestId": request_id.document_key(),
        "bloodGroup": response.donor_blood_group,
        "createdAt": response.responded_at.map(|t| t.to_rfc3339()),
    });
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

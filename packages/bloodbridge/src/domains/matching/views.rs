//! Pure per-snapshot computation for both feed roles.
//!
//! Donor feed: pending requests in the donor's blood group and city that the
//! donor has not answered yet, oldest deadline first, undated last.
//!
//! Receiver feed: every response on the receiver's own requests, one per
//! donor per request (first entry in array order wins), newest first.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::common::{RequestId, UserId};
use crate::domains::profiles::{ResolvedProfile, Role};
use crate::domains::requests::gate::CompletenessGate;
use crate::domains::requests::models::{
    BloodRequest, DonorResponse, RawBloodRequest, RequestStatus,
};
use crate::kernel::{Collection, Document, Query};

/// Parameters of one live query. A change in any of them means a new subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedParams {
    pub user_id: UserId,
    pub role: Role,
    pub blood_group: String,
    pub city: String,
}

impl FeedParams {
    pub fn from_resolved(resolved: &ResolvedProfile) -> Self {
        Self {
            user_id: resolved.profile.id,
            role: resolved.role,
            blood_group: resolved.profile.blood_group.clone(),
            city: resolved.profile.city.clone(),
        }
    }

    /// The store query backing this feed.
    pub fn query(&self) -> Query {
        match self.role {
            Role::Donor => Query::new(Collection::Requests)
                .where_eq("bloodGroup", self.blood_group.as_str())
                .where_eq("city", self.city.as_str())
                .where_eq("status", RequestStatus::Pending.as_str()),
            Role::Receiver => Query::new(Collection::Requests).where_eq("ownerId", self.user_id),
        }
    }
}

/// A request surfaced to a donor.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRequest {
    pub request: BloodRequest,
    /// The donor is not in `seenBy` yet
    pub is_new: bool,
}

/// A response surfaced to a receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseItem {
    pub request_id: RequestId,
    pub request_purpose: String,
    pub response: DonorResponse,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItems {
    Requests(Vec<MatchedRequest>),
    Responses(Vec<ResponseItem>),
}

impl FeedItems {
    pub fn empty_for(role: Role) -> Self {
        match role {
            Role::Donor => Self::Requests(Vec::new()),
            Role::Receiver => Self::Responses(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Requests(items) => items.len(),
            Self::Responses(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unseen_count(&self) -> usize {
        match self {
            Self::Requests(items) => items.iter().filter(|i| i.is_new).count(),
            Self::Responses(items) => items.iter().filter(|i| i.is_new).count(),
        }
    }

    /// Drop donor items whose request id is in `hidden`.
    pub fn without_hidden(self, hidden: &HashSet<RequestId>) -> Self {
        match self {
            Self::Requests(items) if !hidden.is_empty() => Self::Requests(
                items
                    .into_iter()
                    .filter(|i| !hidden.contains(&i.request.id))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Result of running one snapshot through the role filter and the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedView {
    pub items: FeedItems,
    pub unseen_count: usize,
    /// Records that would be surfaced but failed the completeness gate
    pub deferred: usize,
    /// Donor feed: requests still open to this donor in the snapshot
    pub open_request_ids: HashSet<RequestId>,
}

pub fn compute_view(
    params: &FeedParams,
    docs: &[Document],
    hidden: &HashSet<RequestId>,
) -> ComputedView {
    match params.role {
        Role::Donor => donor_view(docs, params.user_id, hidden),
        Role::Receiver => receiver_view(docs),
    }
}

fn cmp_optional_asc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_optional_desc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Oldest deadline first, undated last. Stable: equal deadlines keep their order.
pub(crate) fn sort_by_deadline(items: &mut [MatchedRequest]) {
    items.sort_by(|a, b| {
        cmp_optional_asc(a.request.required_date_time, b.request.required_date_time)
    });
}

pub fn donor_view(
    docs: &[Document],
    donor_id: UserId,
    hidden: &HashSet<RequestId>,
) -> ComputedView {
    let mut deferred = 0;
    let mut open_request_ids = HashSet::new();
    let mut items = Vec::new();

    for doc in docs {
        let Some(raw) = RawBloodRequest::from_document(doc) else {
            deferred += 1;
            continue;
        };
        if raw.has_response_from(donor_id) {
            continue;
        }
        let Some(request) = CompletenessGate::admit_request(&raw) else {
            deferred += 1;
            continue;
        };
        open_request_ids.insert(request.id);
        if hidden.contains(&request.id) {
            continue;
        }
        items.push(MatchedRequest {
            is_new: !raw.is_seen_by(donor_id),
            request,
        });
    }

    sort_by_deadline(&mut items);

    let items = FeedItems::Requests(items);
    ComputedView {
        unseen_count: items.unseen_count(),
        items,
        deferred,
        open_request_ids,
    }
}

pub fn receiver_view(docs: &[Document]) -> ComputedView {
    let mut deferred = 0;
    let mut items = Vec::new();

    for doc in docs {
        let Some(raw) = RawBloodRequest::from_document(doc) else {
            deferred += 1;
            continue;
        };
        let Ok(request_id) = RequestId::parse(&raw.id) else {
            deferred += 1;
            continue;
        };

        let mut donors = HashSet::new();
        for response in raw.raw_responses() {
            if !donors.insert(response.donor_id.trim().to_string()) {
                continue;
            }
            match CompletenessGate::admit_response(&response, &raw) {
                Some(response) => items.push(ResponseItem {
                    request_id,
                    request_purpose: raw.purpose.clone(),
                    is_new: !response.seen_by_receiver,
                    response,
                }),
                None => deferred += 1,
            }
        }
    }

    items.sort_by(|a, b| cmp_optional_desc(a.response.responded_at, b.response.responded_at));

    let items = FeedItems::Responses(items);
    ComputedView {
        unseen_count: items.unseen_count(),
        items,
        deferred,
        open_request_ids: HashSet::new(),
    }
}

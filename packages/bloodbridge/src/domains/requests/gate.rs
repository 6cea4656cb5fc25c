//! Completeness gate.
//!
//! The store's change feed can emit a document as soon as its first field
//! lands, before a multi-field create has finished propagating. Nothing is
//! surfaced until its essential fields are all present and non-blank:
//!
//! - request: `city`, `bloodGroup`, `purpose`
//! - response: `status`, plus a blood group (own, or the parent request's)
//!
//! The gate is applied per record. Failing it is never an error; the record
//! is simply deferred until a later snapshot completes it.

use super::models::{BloodRequest, DonorResponse, RawBloodRequest, RawDonorResponse};

/// Which essential-field contract a record is checked against.
#[derive(Debug, Clone, Copy)]
pub enum GateRecord<'a> {
    Request(&'a RawBloodRequest),
    Response {
        response: &'a RawDonorResponse,
        parent: &'a RawBloodRequest,
    },
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

pub struct CompletenessGate;

impl CompletenessGate {
    pub fn is_complete(record: GateRecord<'_>) -> bool {
        match record {
            GateRecord::Request(raw) => {
                filled(&raw.city) && filled(&raw.blood_group) && filled(&raw.purpose)
            }
            GateRecord::Response { response, parent } => {
                filled(&response.status) && Self::resolved_blood_group(response, parent).is_some()
            }
        }
    }

    /// The response's own blood group, falling back to the request's.
    pub fn resolved_blood_group<'a>(
        response: &'a RawDonorResponse,
        parent: &'a RawBloodRequest,
    ) -> Option<&'a str> {
        [response.donor_blood_group.as_str(), parent.blood_group.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|g| !g.is_empty())
    }

    /// Gate and type one response entry.
    pub fn admit_response(
        response: &RawDonorResponse,
        parent: &RawBloodRequest,
    ) -> Option<DonorResponse> {
        if !Self::is_complete(GateRecord::Response { response, parent }) {
            return None;
        }
        let blood_group = Self::resolved_blood_group(response, parent)?;
        DonorResponse::from_raw(response, blood_group)
    }

    /// Gate and type a request together with its complete responses.
    pub fn admit_request(raw: &RawBloodRequest) -> Option<BloodRequest> {
        if !Self::is_complete(GateRecord::Request(raw)) {
            return None;
        }
        let responses = raw
            .raw_responses()
            .iter()
            .filter_map(|r| Self::admit_response(r, raw))
            .collect();
        BloodRequest::from_raw(raw, responses)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

use super::response::{DonorResponse, RawDonorResponse};
use super::timestamp::parse_timestamp;
use crate::common::utils::null_as_default;
use crate::common::{RequestId, UserId};
use crate::kernel::{Document, Fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
        }
    }

    /// Unknown or blank values read as `pending`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim() {
            "accepted" => Self::Accepted,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request document as delivered by the store, possibly half-written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBloodRequest {
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blood_group: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub purpose: String,
    #[serde(default)]
    pub blood_units: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hospital: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mobile: String,
    #[serde(default)]
    pub required_date_time: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responded_by: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seen_by: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responses: Vec<Value>,
}

impl RawBloodRequest {
    /// Lenient parse. A document whose fields have the wrong shape is
    /// treated like one that has not finished propagating.
    pub fn from_document(doc: &Document) -> Option<Self> {
        match serde_json::from_value::<RawBloodRequest>(Value::Object(doc.fields.clone())) {
            Ok(mut raw) => {
                raw.id = doc.id.clone();
                Some(raw)
            }
            Err(e) => {
                debug!(request_id = %doc.id, error = %e, "Unreadable request document");
                None
            }
        }
    }

    /// Response entries in array order; malformed elements are skipped.
    pub fn raw_responses(&self) -> Vec<RawDonorResponse> {
        self.responses
            .iter()
            .filter_map(RawDonorResponse::from_value)
            .collect()
    }

    /// True if any response entry, complete or not, names this donor.
    pub fn has_response_from(&self, donor_id: UserId) -> bool {
        let key = donor_id.document_key();
        self.responses
            .iter()
            .any(|r| r.get("donorId").and_then(Value::as_str) == Some(key.as_str()))
    }

    pub fn is_seen_by(&self, user_id: UserId) -> bool {
        let key = user_id.document_key();
        self.seen_by.iter().any(|v| v.as_str() == Some(key.as_str()))
    }

    pub fn required_at(&self) -> Option<DateTime<Utc>> {
        self.required_date_time.as_ref().and_then(parse_timestamp)
    }

    pub fn units(&self) -> Option<u32> {
        match self.blood_units.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|u| u32::try_from(u).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A request that has passed the completeness gate.
#[derive(Debug, Clone, PartialEq)]
pub struct BloodRequest {
    pub id: RequestId,
    pub owner_id: Option<UserId>,
    pub blood_group: String,
    pub city: String,
    pub purpose: String,
    pub blood_units: Option<u32>,
    pub hospital: String,
    pub mobile: String,
    pub required_date_time: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub responded_by: Option<String>,
    pub seen_by: Vec<UserId>,
    /// Complete responses only, in array order, duplicates preserved.
    pub responses: Vec<DonorResponse>,
}

impl BloodRequest {
    /// Typed view of a raw request; the caller has already gated it.
    pub(crate) fn from_raw(raw: &RawBloodRequest, responses: Vec<DonorResponse>) -> Option<Self> {
        Some(Self {
            id: RequestId::parse(&raw.id).ok()?,
            owner_id: UserId::parse_opt(Some(&raw.owner_id)),
            blood_group: raw.blood_group.clone(),
            city: raw.city.clone(),
            purpose: raw.purpose.clone(),
            blood_units: raw.units(),
            hospital: raw.hospital.clone(),
            mobile: raw.mobile.clone(),
            required_date_time: raw.required_at(),
            status: RequestStatus::parse_lenient(&raw.status),
            responded_by: Some(raw.responded_by.clone()).filter(|s| !s.trim().is_empty()),
            seen_by: raw
                .seen_by
                .iter()
                .filter_map(|v| UserId::parse_opt(v.as_str()))
                .collect(),
            responses,
        })
    }
}

/// What a receiver fills in to ask for blood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDraft {
    pub blood_group: String,
    pub city: String,
    pub purpose: String,
    pub blood_units: u32,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub required_date_time: Option<DateTime<Utc>>,
}

impl RequestDraft {
    /// Full document written on creation.
    pub fn to_fields(&self, owner_id: UserId) -> Fields {
        let value = json!({
            "ownerId": owner_id.document_key(),
            "bloodGroup": self.blood_group,
            "city": self.city,
            "purpose": self.purpose,
            "bloodUnits": self.blood_units,
            "hospital": self.hospital,
            "mobile": self.mobile,
            "requiredDateTime": self.required_date_time.map(|t| t.to_rfc3339()),
            "status": RequestStatus::Pending.as_str(),
            "seenBy": [],
            "responses": [],
        });
        match value {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        }
    }
}

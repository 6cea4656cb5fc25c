use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use super::timestamp::parse_timestamp;
use crate::common::utils::null_as_default;
use crate::common::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Declined,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response entry exactly as it sits in a request's `responses` array.
///
/// Every field is optional: the change feed may hand us an entry before all
/// of it has propagated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDonorResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub donor_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub donor_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub donor_mobile: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub donor_blood_group: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub donor_city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub responded_at: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seen_by_receiver: bool,
}

impl RawDonorResponse {
    /// Lenient parse of one array element; malformed entries yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// A donor's accept/decline answer, embedded in `BloodRequest.responses`.
///
/// The donor fields are a snapshot taken when the response was made; later
/// profile edits do not touch them.
#[derive(Debug, Clone, PartialEq)]
pub struct DonorResponse {
    pub donor_id: UserId,
    pub donor_name: String,
    pub donor_mobile: String,
    pub donor_blood_group: String,
    pub donor_city: String,
    pub status: ResponseStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub seen_by_receiver: bool,
}

impl DonorResponse {
    /// Typed view of a raw entry. `blood_group` is the resolved group
    /// (own or inherited); the caller has already gated the entry.
    pub(crate) fn from_raw(raw: &RawDonorResponse, blood_group: &str) -> Option<Self> {
        Some(Self {
            donor_id: UserId::parse(&raw.donor_id).ok()?,
            donor_name: raw.donor_name.clone(),
            donor_mobile: raw.donor_mobile.clone(),
            donor_blood_group: blood_group.to_string(),
            donor_city: raw.donor_city.clone(),
            status: ResponseStatus::parse(&raw.status)?,
            responded_at: raw.responded_at.as_ref().and_then(parse_timestamp),
            seen_by_receiver: raw.seen_by_receiver,
        })
    }

    /// Document form appended to `responses`.
    pub fn to_value(&self) -> Value {
        json!({
            "donorId": self.donor_id.document_key(),
            "donorName": self.donor_name,
            "donorMobile": self.donor_mobile,
            "donorBloodGroup": self.donor_blood_group,
            "donorCity": self.donor_city,
            "status": self.status.as_str(),
            "respondedAt": self.responded_at.map(|t| t.to_rfc3339()),
            "seenByReceiver": self.seen_by_receiver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_tolerates_nulls_and_missing_fields() {
        let raw = RawDonorResponse::from_value(&json!({
            "donorId": "x",
            "donorName": null,
            "status": "accepted"
        }))
        .unwrap();

        assert_eq!(raw.donor_name, "");
        assert!(!raw.seen_by_receiver);
        assert!(raw.responded_at.is_none());
    }

    #[test]
    fn test_unknown_status_does_not_type() {
        let raw = RawDonorResponse {
            donor_id: UserId::new().document_key(),
            status: "maybe".into(),
            ..Default::default()
        };
        assert!(DonorResponse::from_raw(&raw, "O+").is_none());
    }

    #[test]
    fn test_value_form_is_readable_back() {
        let response = DonorResponse {
            donor_id: UserId::new(),
            donor_name: "Kumar".into(),
            donor_mobile: "9222222222".into(),
            donor_blood_group: "O+".into(),
            donor_city: "Chennai".into(),
            status: ResponseStatus::Declined,
            responded_at: Some(Utc::now()),
            seen_by_receiver: false,
        };

        let raw = RawDonorResponse::from_value(&response.to_value()).unwrap();
        let typed = DonorResponse::from_raw(&raw, &raw.donor_blood_group).unwrap();

        assert_eq!(typed.donor_id, response.donor_id);
        assert_eq!(typed.status, ResponseStatus::Declined);
    }
}

//! Test fixtures for creating profiles, requests and history.

#![allow(dead_code)]

use anyhow::Result;
use bloodbridge_core::common::{DonationId, RequestId, UserId};
use bloodbridge_core::domains::profiles::UserProfile;
use bloodbridge_core::domains::requests::RequestDraft;
use bloodbridge_core::kernel::{BaseDocumentStore, Collection, Fields, InMemoryDocumentStore};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

/// Create a profile document and return the profile
pub async fn create_profile(
    store: &InMemoryDocumentStore,
    name: &str,
    blood_group: &str,
    city: &str,
    push_token: Option<&str>,
) -> Result<UserProfile> {
    let profile = UserProfile {
        id: UserId::new(),
        name: name.to_string(),
        mobile: "9000000000".to_string(),
        blood_group: blood_group.to_string(),
        city: city.to_string(),
        push_token: push_token.map(str::to_string),
        is_admin: false,
    };
    store
        .put(
            Collection::Profiles,
            &profile.id.document_key(),
            profile.to_fields(),
            false,
        )
        .await?;
    Ok(profile)
}

/// Create a profile with one past donation, so it classifies as a donor
pub async fn create_donor(
    store: &InMemoryDocumentStore,
    name: &str,
    blood_group: &str,
    city: &str,
    push_token: Option<&str>,
) -> Result<UserProfile> {
    let profile = create_profile(store, name, blood_group, city, push_token).await?;
    add_donation(store, profile.id).await?;
    Ok(profile)
}

pub async fn add_donation(store: &InMemoryDocumentStore, donor_id: UserId) -> Result<DonationId> {
    let id = DonationId::new();
    store
        .put(
            Collection::Donations,
            &id.document_key(),
            fields(json!({"donorId": donor_id.document_key()})),
            false,
        )
        .await?;
    Ok(id)
}

pub fn draft(blood_group: &str, city: &str, purpose: &str) -> RequestDraft {
    RequestDraft {
        blood_group: blood_group.to_string(),
        city: city.to_string(),
        purpose: purpose.to_string(),
        blood_units: 2,
        hospital: "Government General Hospital".to_string(),
        mobile: "9111111111".to_string(),
        required_date_time: None,
    }
}

/// Write a complete pending request document
pub async fn create_request(
    store: &InMemoryDocumentStore,
    owner_id: UserId,
    draft: &RequestDraft,
) -> Result<RequestId> {
    let id = RequestId::new();
    store
        .put(Collection::Requests, &id.document_key(), draft.to_fields(owner_id), false)
        .await?;
    Ok(id)
}

pub async fn create_request_due(
    store: &InMemoryDocumentStore,
    owner_id: UserId,
    purpose: &str,
    required: Option<DateTime<Utc>>,
) -> Result<RequestId> {
    let mut d = draft("O+", "Chennai", purpose);
    d.required_date_time = required;
    create_request(store, owner_id, &d).await
}

/// Raw response entry as a donor's device would append it
pub fn response_entry(donor_id: UserId, name: &str, status: &str, responded_at: &str) -> Value {
    json!({
        "donorId": donor_id.document_key(),
        "donorName": name,
        "donorMobile": "9222222222",
        "donorBloodGroup": "O+",
        "donorCity": "Chennai",
        "status": status,
        "respondedAt": responded_at,
        "seenByReceiver": false,
    })
}

pub async fn set_responses(
    store: &InMemoryDocumentStore,
    request_id: RequestId,
    responses: Vec<Value>,
) -> Result<()> {
    store
        .put(
            Collection::Requests,
            &request_id.document_key(),
            fields(json!({"responses": responses})),
            true,
        )
        .await
}

pub async fn get_request(store: &InMemoryDocumentStore, request_id: RequestId) -> Result<Fields> {
    let doc = store
        .get(Collection::Requests, &request_id.document_key())
        .await?
        .ok_or_else(|| anyhow::anyhow!("request {} missing", request_id))?;
    Ok(doc.fields)
}

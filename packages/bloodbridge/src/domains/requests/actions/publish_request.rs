use tracing::{error, info};

use crate::common::{EngineError, EngineResult, RequestId, UserId};
use crate::domains::notifications::{DispatchReport, NotificationDispatcher};
use crate::domains::profiles::BloodGroup;
use crate::domains::requests::gate::CompletenessGate;
use crate::domains::requests::models::{BloodRequest, RawBloodRequest, RequestDraft};
use crate::kernel::{Collection, Document, EngineDeps};

/// A persisted request and the outcome of its donor fan-out.
#[derive(Debug)]
pub struct PublishedRequest {
    pub request: BloodRequest,
    /// `None` when the fan-out itself failed; the request stays persisted.
    pub dispatch: Option<DispatchReport>,
}

/// Reject drafts that could never pass the completeness gate or match anyone.
pub fn validate_draft(draft: &RequestDraft) -> EngineResult<()> {
    draft.blood_group.parse::<BloodGroup>()?;
    if draft.city.trim().is_empty() {
        return Err(EngineError::InvalidRecord("city must not be blank".into()));
    }
    if draft.purpose.trim().is_empty() {
        return Err(EngineError::InvalidRecord("purpose must not be blank".into()));
    }
    if draft.blood_units == 0 {
        return Err(EngineError::InvalidRecord("at least one unit is required".into()));
    }
    Ok(())
}

/// Create a pending request and notify matching donors.
///
/// The request document is written whole in one put, then the dispatcher
/// runs. A fan-out failure is logged and reported, never rolled back.
pub async fn publish_request(
    owner_id: UserId,
    draft: RequestDraft,
    deps: &EngineDeps,
    dispatcher: &NotificationDispatcher,
) -> EngineResult<PublishedRequest> {
    validate_draft(&draft)?;

    let mut draft = draft;
    draft.blood_group = draft.blood_group.parse::<BloodGroup>()?.as_str().to_string();
    draft.city = draft.city.trim().to_string();

    let request_id = RequestId::new();
    let fields = draft.to_fields(owner_id);
    deps.store
        .put(Collection::Requests, &request_id.document_key(), fields.clone(), false)
        .await
        .map_err(EngineError::write("create request"))?;

    let doc = Document::new(request_id.document_key(), fields);
    let request = RawBloodRequest::from_document(&doc)
        .as_ref()
        .and_then(CompletenessGate::admit_request)
        .ok_or_else(|| EngineError::InvalidRecord(format!("request {} failed to read back", request_id)))?;

    info!(request_id = %request.id, owner_id = %owner_id, "Blood request created");

    let dispatch = match dispatcher.notify_matching_donors(&request).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(request_id = %request.id, error = %e, "Donor fan-out failed");
            None
        }
    };

    Ok(PublishedRequest { request, dispatch })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RequestDraft {
        RequestDraft {
            blood_group: "o+".into(),
            city: "Chennai".into(),
            purpose: "Surgery".into(),
            blood_units: 1,
            hospital: String::new(),
            mobile: String::new(),
            required_date_time: None,
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn test_unknown_blood_group_rejected() {
        let mut d = draft();
        d.blood_group = "Z".into();
        assert!(matches!(validate_draft(&d), Err(EngineError::InvalidRecord(_))));
    }

    #[test]
    fn test_blank_purpose_and_zero_units_rejected() {
        let mut d = draft();
        d.purpose = " ".into();
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.blood_units = 0;
        assert!(validate_draft(&d).is_err());
    }
}

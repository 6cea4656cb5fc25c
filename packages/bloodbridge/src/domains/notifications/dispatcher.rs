use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::dedup::DedupWindow;
use super::key::{NotificationKey, NotificationKind};
use crate::common::{EngineError, EngineResult, UserId};
use crate::domains::profiles::UserProfile;
use crate::domains::requests::models::{BloodRequest, DonorResponse, ResponseStatus};
use crate::kernel::{BasePushNotificationService, Collection, EngineDeps, Query, Update};

/// Outcome of one fan-out. Partial failure is a normal result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Profiles returned by the match query
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_owner: usize,
    pub skipped_no_address: usize,
    pub skipped_duplicate: usize,
    /// Provider delivery ids of successful sends
    pub delivery_ids: Vec<String>,
}

impl DispatchReport {
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Dispatch pipeline:
/// 1. Query profiles with the request's blood group and city
/// 2. Skip the owner and anyone without a push token
/// 3. Skip keys sent within the dedup window
/// 4. Send one notification per remaining profile, continuing past failures
/// 5. Record the fan-out on the request
pub struct NotificationDispatcher {
    deps: EngineDeps,
    dedup: DedupWindow,
}

impl NotificationDispatcher {
    pub fn new(deps: EngineDeps) -> Self {
        let dedup = DedupWindow::new(deps.config.dedup_window);
        Self { deps, dedup }
    }

    /// Notify every matching donor about a newly created request.
    pub async fn notify_matching_donors(
        &self,
        request: &BloodRequest,
    ) -> EngineResult<DispatchReport> {
        info!(
            request_id = %request.id,
            blood_group = %request.blood_group,
            city = %request.city,
            "Finding donors to notify"
        );

        let query = Query::new(Collection::Profiles)
            .where_eq("bloodGroup", request.blood_group.as_str())
            .where_eq("city", request.city.as_str());
        let candidates = self.deps.store.query(&query).await?;

        let mut report = DispatchReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        let title = format!("{} blood needed in {}", request.blood_group, request.city);
        let body = match request.blood_units {
            Some(units) if !request.hospital.trim().is_empty() => {
                format!("{} - {} unit(s) at {}", request.purpose, units, request.hospital)
            }
            Some(units) => format!("{} - {} unit(s)", request.purpose, units),
            None => request.purpose.clone(),
        };
        let data = json!({
            "type": NotificationKind::NewRequest.as_str(),
            "requestId": request.id.document_key(),
        });

        for doc in &candidates {
            let profile = match UserProfile::from_document(doc) {
                Ok(profile) => profile,
                Err(e) => {
                    debug!(profile_id = %doc.id, error = %e, "Skipping unreadable profile");
                    continue;
                }
            };

            if request.owner_id == Some(profile.id) {
                report.skipped_owner += 1;
                continue;
            }

            let Some(address) = profile.delivery_address() else {
                report.skipped_no_address += 1;
                continue;
            };

            let key =
                NotificationKey::derive(NotificationKind::NewRequest, request.id, Some(profile.id));
            self.deliver(&key, profile.id, address, &title, &body, data.clone(), &mut report)
                .await;
        }

        // A fan-out that sent nothing leaves the earlier bookkeeping alone.
        if report.sent > 0 {
            self.deps
                .store
                .update(
                    Update::new(Collection::Requests, request.id.document_key())
                        .increment("notifiedCount", report.sent as i64)
                        .server_timestamp("lastNotifiedAt"),
                )
                .await
                .map_err(EngineError::write("record notification fan-out"))?;
        }

        info!(
            request_id = %request.id,
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            duplicates = report.skipped_duplicate,
            "Donor fan-out complete"
        );
        Ok(report)
    }

    /// Tell the request owner that a donor answered.
    pub async fn notify_request_owner(
        &self,
        request: &BloodRequest,
        response: &DonorResponse,
    ) -> EngineResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let Some(owner_id) = request.owner_id else {
            debug!(request_id = %request.id, "Request has no owner to notify");
            return Ok(report);
        };

        let Some(doc) = self
            .deps
            .store
            .get(Collection::Profiles, &owner_id.document_key())
            .await?
        else {
            debug!(request_id = %request.id, owner_id = %owner_id, "Owner profile missing");
            return Ok(report);
        };
        let owner = UserProfile::from_document(&doc)?;
        report.candidates = 1;

        let Some(address) = owner.delivery_address() else {
            report.skipped_no_address += 1;
            return Ok(report);
        };

        let title = match response.status {
            ResponseStatus::Accepted => {
                format!("{} accepted your request", response.donor_name)
            }
            ResponseStatus::Declined => {
                format!("{} declined your request", response.donor_name)
            }
        };
        let body = format!("{} blood for {}", request.blood_group, request.purpose);
        let data = json!({
            "type": NotificationKind::ResponseReceived.as_str(),
            "requestId": request.id.document_key(),
            "donorId": response.donor_id.document_key(),
            "status": response.status.as_str(),
        });

        let key = NotificationKey::derive(
            NotificationKind::ResponseReceived,
            request.id,
            Some(response.donor_id),
        );
        self.deliver(&key, owner_id, address, &title, &body, data, &mut report)
            .await;
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver(
        &self,
        key: &NotificationKey,
        recipient: UserId,
        address: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
        report: &mut DispatchReport,
    ) {
        if !self.dedup.try_reserve(key, self.deps.clock.now()) {
            debug!(recipient = %recipient, key = %key, "Duplicate notification suppressed");
            report.skipped_duplicate += 1;
            return;
        }

        match send_push_notification(
            self.deps.push_service.as_ref(),
            recipient,
            address,
            title,
            body,
            data,
        )
        .await
        {
            Ok(delivery_id) => {
                report.sent += 1;
                report.delivery_ids.push(delivery_id);
            }
            Err(e) => {
                self.dedup.release(key);
                warn!(error = %e, "Notification skipped after send failure");
                report.failed += 1;
            }
        }
    }
}

/// Send one push notification
#[instrument(skip(push_service, title, body, data), fields(recipient = %recipient))]
async fn send_push_notification(
    push_service: &dyn BasePushNotificationService,
    recipient: UserId,
    address: &str,
    title: &str,
    body: &str,
    data: serde_json::Value,
) -> EngineResult<String> {
    debug!(title = %title, body = %body, "Sending push notification");

    push_service
        .send_notification(address, title, body, data)
        .await
        .map_err(|source| EngineError::Dispatch {
            recipient: recipient.to_string(),
            source,
        })
}

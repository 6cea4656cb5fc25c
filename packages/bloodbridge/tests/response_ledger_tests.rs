//! Integration tests for accept/decline responses.

mod common;

use bloodbridge_core::common::{Clock, EngineError, RequestId};
use bloodbridge_core::domains::matching::{FeedStatus, MatchingSession};
use bloodbridge_core::domains::notifications::NotificationDispatcher;
use bloodbridge_core::domains::requests::ResponseStatus;
use bloodbridge_core::domains::responses::ResponseLedger;
use bloodbridge_core::kernel::{BaseDocumentStore, Collection, Query};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn responses_from(fields: &bloodbridge_core::kernel::Fields, donor: &str) -> Vec<Value> {
    fields["responses"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r["donorId"] == json!(donor))
        .collect()
}

#[tokio::test]
async fn accept_round_trip_records_response_status_and_donation() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let ledger = ResponseLedger::new(h.engine_deps());
    let response = ledger
        .respond(request_id, &donor, ResponseStatus::Accepted)
        .await
        .unwrap();
    assert_eq!(response.responded_at, Some(h.deps.clock.now()));
    assert!(!response.seen_by_receiver);

    let fields = get_request(h.store(), request_id).await.unwrap();
    let mine = responses_from(&fields, &donor.id.document_key());
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], json!("accepted"));
    assert_eq!(mine[0]["donorBloodGroup"], json!("O+"));
    assert_eq!(fields["status"], json!("accepted"));
    assert_eq!(fields["respondedBy"], json!("Kumar"));
    assert_eq!(fields["seenBy"], json!([donor.id.document_key()]));

    let donations = h
        .store()
        .count(&Query::new(Collection::Donations).where_eq("donorId", donor.id))
        .await
        .unwrap();
    assert_eq!(donations, 1);

    // One batch: request update plus donation record.
    assert_eq!(h.deps.store.commit_count(), 1);
    assert_eq!(h.deps.store.write_count(), 2);
}

#[tokio::test]
async fn decline_leaves_request_pending() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    ResponseLedger::new(h.engine_deps())
        .respond(request_id, &donor, ResponseStatus::Declined)
        .await
        .unwrap();

    let fields = get_request(h.store(), request_id).await.unwrap();
    assert_eq!(fields["status"], json!("pending"));
    assert!(fields.get("respondedBy").is_none());
    assert_eq!(responses_from(&fields, &donor.id.document_key()).len(), 1);
    assert_eq!(
        h.store().count(&Query::new(Collection::Donations)).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn response_keeps_donor_snapshot_after_profile_changes() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let mut donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    ResponseLedger::new(h.engine_deps())
        .respond(request_id, &donor, ResponseStatus::Accepted)
        .await
        .unwrap();

    donor.city = "Madurai".into();
    h.store()
        .put(Collection::Profiles, &donor.id.document_key(), donor.to_fields(), true)
        .await
        .unwrap();

    let fields = get_request(h.store(), request_id).await.unwrap();
    let mine = responses_from(&fields, &donor.id.document_key());
    assert_eq!(mine[0]["donorCity"], json!("Chennai"));
}

#[tokio::test]
async fn two_donors_accepting_at_once_both_persist() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let kumar = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let ravi = create_profile(h.store(), "Ravi", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let ledger = ResponseLedger::new(h.engine_deps());
    let (a, b) = tokio::join!(
        ledger.respond(request_id, &kumar, ResponseStatus::Accepted),
        ledger.respond(request_id, &ravi, ResponseStatus::Accepted),
    );
    a.unwrap();
    b.unwrap();

    let fields = get_request(h.store(), request_id).await.unwrap();
    assert_eq!(fields["responses"].as_array().map(Vec::len), Some(2));
    assert_eq!(responses_from(&fields, &kumar.id.document_key()).len(), 1);
    assert_eq!(responses_from(&fields, &ravi.id.document_key()).len(), 1);
    assert_eq!(fields["status"], json!("accepted"));
    let responded_by = fields["respondedBy"].as_str().unwrap();
    assert!(responded_by == "Kumar" || responded_by == "Ravi");
}

#[tokio::test]
async fn responding_to_missing_request_is_not_found() {
    let h = TestHarness::new();
    let donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();

    let err = ResponseLedger::new(h.engine_deps())
        .respond(RequestId::new(), &donor, ResponseStatus::Accepted)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotFound { collection: "requests", .. }));
    assert_eq!(h.deps.store.commit_count(), 0);
}

#[tokio::test]
async fn accepted_request_leaves_donor_feed_immediately() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let donor = create_donor(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let session = MatchingSession::new(h.engine_deps(), donor.id, None);
    session.mount().await.unwrap();
    wait_for_view(&mut session.watch(), |v| v.requests().len() == 1).await;

    session
        .respond(request_id, ResponseStatus::Accepted)
        .await
        .unwrap();

    assert!(session.view().requests().is_empty());
    assert_eq!(session.view().unseen_count, 0);

    // And it stays gone once the store catches up.
    h.settle().await;
    assert!(session.view().requests().is_empty());
}

#[tokio::test]
async fn receiver_session_cannot_respond_to_requests() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let session = MatchingSession::new(h.engine_deps(), owner.id, None);
    session.mount().await.unwrap();

    let err = session
        .respond(request_id, ResponseStatus::Accepted)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidRecord(_)));
    assert_eq!(h.deps.store.commit_count(), 0);
    let fields = get_request(h.store(), request_id).await.unwrap();
    assert_eq!(fields["responses"], json!([]));
}

#[tokio::test]
async fn failed_response_write_rolls_back_optimistic_removal() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    let donor = create_donor(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let session = MatchingSession::new(h.engine_deps(), donor.id, None);
    session.mount().await.unwrap();
    wait_for_view(&mut session.watch(), |v| v.requests().len() == 1).await;

    h.deps.store.set_fail_writes(true);
    let err = session
        .respond(request_id, ResponseStatus::Accepted)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::WriteFailure { .. }));
    assert!(err.is_retryable_action());
    let view = session.view();
    assert_eq!(view.status, FeedStatus::Ready);
    assert_eq!(view.requests().len(), 1);
    assert_eq!(view.requests()[0].request.id, request_id);
    assert_eq!(view.unseen_count, 1);

    let fields = get_request(h.store(), request_id).await.unwrap();
    assert_eq!(fields["responses"], json!([]));

    // Retry once the store recovers.
    h.deps.store.set_fail_writes(false);
    session
        .respond(request_id, ResponseStatus::Accepted)
        .await
        .unwrap();
    assert!(session.view().requests().is_empty());
}

#[tokio::test]
async fn owner_is_notified_of_a_response() {
    let h = TestHarness::new();
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", Some("ExponentPushToken[owner]"))
        .await
        .unwrap();
    let donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let dispatcher = Arc::new(NotificationDispatcher::new(h.engine_deps()));
    let ledger = ResponseLedger::new(h.engine_deps()).with_dispatcher(dispatcher);
    ledger
        .respond(request_id, &donor, ResponseStatus::Accepted)
        .await
        .unwrap();

    let sent = h.deps.push.sent_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].push_token, "ExponentPushToken[owner]");
    assert_eq!(sent[0].title, "Kumar accepted your request");
    assert_eq!(sent[0].data["type"], json!("response_received"));
}

#[tokio::test]
async fn owner_notification_failure_does_not_fail_the_response() {
    let h = TestHarness::with_push(
        bloodbridge_core::kernel::test_dependencies::MockPushNotificationService::new()
            .failing_for("ExponentPushToken[owner]"),
    );
    let owner = create_profile(h.store(), "Priya", "O+", "Chennai", Some("ExponentPushToken[owner]"))
        .await
        .unwrap();
    let donor = create_profile(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let request_id = create_request(h.store(), owner.id, &draft("O+", "Chennai", "Surgery"))
        .await
        .unwrap();

    let dispatcher = Arc::new(NotificationDispatcher::new(h.engine_deps()));
    let response = ResponseLedger::new(h.engine_deps())
        .with_dispatcher(dispatcher)
        .respond(request_id, &donor, ResponseStatus::Declined)
        .await
        .unwrap();

    assert_eq!(response.status, ResponseStatus::Declined);
    assert!(h.deps.push.sent_notifications().is_empty());
}

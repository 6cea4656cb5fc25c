//! Integration tests for profile loading and role classification.

mod common;

use bloodbridge_core::common::{EngineError, UserId};
use bloodbridge_core::domains::profiles::{ProfileResolution, ProfileResolver, Role, RoleCounts};
use common::*;

#[tokio::test]
async fn missing_profile_resolves_to_no_profile() {
    let h = TestHarness::new();
    let resolver = ProfileResolver::new(h.engine_deps());
    let user = UserId::new();

    assert_eq!(resolver.resolve(user).await.unwrap(), ProfileResolution::NoProfile);
    assert!(matches!(
        resolver.require(user).await.unwrap_err(),
        EngineError::ProfileNotFound(id) if id == user
    ));
}

#[tokio::test]
async fn history_decides_role() {
    let h = TestHarness::new();
    let donor = create_donor(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    let newcomer = create_profile(h.store(), "Ravi", "O+", "Chennai", None).await.unwrap();
    let receiver = create_profile(h.store(), "Priya", "O+", "Chennai", None).await.unwrap();
    create_request(h.store(), receiver.id, &draft("O+", "Chennai", "Surgery")).await.unwrap();

    let resolver = ProfileResolver::new(h.engine_deps());

    let resolved = resolver.require(donor.id).await.unwrap();
    assert_eq!(resolved.role, Role::Donor);
    assert_eq!(resolved.counts, RoleCounts { donations: 1, requests: 0 });

    assert_eq!(resolver.require(newcomer.id).await.unwrap().role, Role::Receiver);

    let resolved = resolver.require(receiver.id).await.unwrap();
    assert_eq!(resolved.role, Role::Receiver);
    assert_eq!(resolved.counts.requests, 1);
}

#[tokio::test]
async fn equal_nonzero_history_classifies_as_donor() {
    let h = TestHarness::new();
    let user = create_donor(h.store(), "Kumar", "O+", "Chennai", None).await.unwrap();
    create_request(h.store(), user.id, &draft("O+", "Chennai", "Surgery")).await.unwrap();

    let resolved = ProfileResolver::new(h.engine_deps()).require(user.id).await.unwrap();

    assert_eq!(resolved.counts, RoleCounts { donations: 1, requests: 1 });
    assert_eq!(resolved.role, Role::Donor);
}

#[tokio::test]
async fn classification_is_cached_until_invalidated() {
    let h = TestHarness::new();
    let user = create_profile(h.store(), "Ravi", "O+", "Chennai", None).await.unwrap();
    let resolver = ProfileResolver::new(h.engine_deps());

    assert_eq!(resolver.require(user.id).await.unwrap().role, Role::Receiver);

    add_donation(h.store(), user.id).await.unwrap();
    assert_eq!(resolver.require(user.id).await.unwrap().role, Role::Receiver);

    resolver.invalidate(user.id).await;
    assert_eq!(resolver.require(user.id).await.unwrap().role, Role::Donor);
}

#[tokio::test]
async fn update_location_moves_profile_and_refreshes_cache() {
    let h = TestHarness::new();
    let user = create_profile(h.store(), "Ravi", "O+", "Chennai", None).await.unwrap();
    let resolver = ProfileResolver::new(h.engine_deps());
    assert!(resolver.cached_profile(user.id).await.is_none());
    resolver.require(user.id).await.unwrap();

    let updated = resolver.update_location(user.id, "  Madurai ").await.unwrap();

    assert_eq!(updated.city, "Madurai");
    assert_eq!(updated.name, "Ravi");
    assert_eq!(resolver.cached_profile(user.id).await.unwrap().city, "Madurai");
    assert_eq!(resolver.require(user.id).await.unwrap().profile.city, "Madurai");
}

#[tokio::test]
async fn update_location_rejects_blank_city_and_unknown_user() {
    let h = TestHarness::new();
    let user = create_profile(h.store(), "Ravi", "O+", "Chennai", None).await.unwrap();
    let resolver = ProfileResolver::new(h.engine_deps());

    assert!(matches!(
        resolver.update_location(user.id, "   ").await.unwrap_err(),
        EngineError::InvalidRecord(_)
    ));
    assert!(matches!(
        resolver.update_location(UserId::new(), "Madurai").await.unwrap_err(),
        EngineError::ProfileNotFound(_)
    ));
}

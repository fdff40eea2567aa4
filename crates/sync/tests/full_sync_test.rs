mod common;

use common::*;
use rendizy_core::SyncError;
use rendizy_staysnet::fake::{Endpoint, FakeChannel, ResponseShape};
use rendizy_store::SyncStore;
use rendizy_sync::{CalendarSyncRequest, FullSyncRequest};
use serde_json::json;

#[tokio::test]
async fn full_sync_imports_all_phases() {
    let h = harness(populated_channel()).await;

    let outcome = h.service.full_sync(ORG, &wide_window()).await.unwrap();

    assert!(outcome.success, "errors: {:?}", outcome.stats.errors);
    assert_eq!(outcome.stats.guests.created, 2);
    assert_eq!(outcome.stats.properties.created, 3);
    assert_eq!(outcome.stats.reservations.fetched, 3);
    assert_eq!(outcome.stats.reservations.created, 3);
    assert!(outcome.stats.errors.is_empty());

    let reservation = h
        .store
        .find_reservation_by_external_id(ORG, "R1")
        .await
        .unwrap()
        .expect("R1 imported");
    let guest = h.store.find_guest_by_external_id(ORG, "c1").await.unwrap().unwrap();
    let property = h.store.find_property_by_code(ORG, "L1").await.unwrap().unwrap();
    assert_eq!(reservation.guest_id, guest.id);
    assert_eq!(reservation.property_id, property.id);
    assert_eq!(reservation.nights, 3);
    assert_eq!(reservation.pricing.total, 1200.0);

    let settings = h.store.get_settings(ORG).await.unwrap().unwrap();
    assert!(settings.last_sync.is_some());
}

#[tokio::test]
async fn full_sync_is_idempotent() {
    let h = harness(populated_channel()).await;

    let first = h.service.full_sync(ORG, &wide_window()).await.unwrap();
    let second = h.service.full_sync(ORG, &wide_window()).await.unwrap();

    assert!(second.success);
    assert_eq!(second.stats.guests.created, 0);
    assert_eq!(second.stats.guests.updated, first.stats.guests.created);
    assert_eq!(second.stats.properties.updated, first.stats.properties.created);
    assert_eq!(second.stats.reservations.updated, first.stats.reservations.created);
    assert_eq!(second.stats.reservations.created, 0);

    assert_eq!(h.store.count_guests(ORG).await.unwrap(), 2);
    assert_eq!(h.store.count_properties(ORG).await.unwrap(), 3);
    assert_eq!(h.store.list_reservations(ORG).await.unwrap().len(), 3);
}

#[tokio::test]
async fn reservation_with_unmapped_client_is_not_written() {
    let channel = populated_channel();
    channel.push_reservation(reservation("R9", "L1", "ghost", 7, 2));
    let h = harness(channel).await;

    let outcome = h.service.full_sync(ORG, &wide_window()).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stats.properties.created, 3);
    assert_eq!(outcome.stats.reservations.created, 3);
    assert_eq!(outcome.stats.reservations.failed, 1);
    assert_eq!(outcome.stats.errors.len(), 1);
    assert!(outcome.stats.errors[0].contains("R9"));
    assert!(h
        .store
        .find_reservation_by_external_id(ORG, "R9")
        .await
        .unwrap()
        .is_none());

    let settings = h.store.get_settings(ORG).await.unwrap().unwrap();
    assert!(settings.last_sync.is_none());
}

#[tokio::test]
async fn response_shapes_yield_identical_stats() {
    let mut results = Vec::new();
    for shape in [ResponseShape::Bare, ResponseShape::Keyed, ResponseShape::Wrapped] {
        let h = harness(populated_channel().with_shape(shape)).await;
        let outcome = h.service.full_sync(ORG, &wide_window()).await.unwrap();
        assert!(outcome.success);
        results.push(outcome.stats);
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[tokio::test]
async fn listings_outage_is_a_general_error_and_guests_still_import() {
    let h = harness(populated_channel().failing(Endpoint::Listings, "Service Unavailable")).await;

    let outcome = h.service.full_sync(ORG, &wide_window()).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stats.guests.created, 2);
    assert_eq!(outcome.stats.properties.fetched, 0);
    assert!(outcome.stats.has_general_error());
    assert!(outcome.stats.errors[0].starts_with("Erro geral"));
    assert_eq!(outcome.stats.reservations.failed, 3);
    assert_eq!(h.store.count_guests(ORG).await.unwrap(), 2);
}

#[tokio::test]
async fn selected_properties_limit_the_import() {
    let h = harness(populated_channel()).await;
    let request = FullSyncRequest {
        selected_property_ids: vec!["L2".to_string()],
        ..wide_window()
    };

    let outcome = h.service.full_sync(ORG, &request).await.unwrap();

    assert_eq!(outcome.stats.properties.fetched, 1);
    assert_eq!(outcome.stats.reservations.created, 1);
    assert_eq!(outcome.stats.reservations.failed, 2);
}

#[tokio::test]
async fn missing_or_disabled_settings_are_configuration_errors() {
    let h = harness(populated_channel()).await;

    let err = h.service.full_sync("unknown-org", &wide_window()).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));

    let mut disabled = settings();
    disabled.enabled = false;
    h.store.save_settings(ORG, &disabled).await.unwrap();
    let err = h.service.owners_sync(ORG).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(h.channel.calls(Endpoint::Owners), 0);
}

#[tokio::test]
async fn concurrent_run_is_rejected() {
    let h = harness(populated_channel()).await;
    let _permit = h.service.guard().acquire(ORG, "full_sync").unwrap();

    let err = h.service.calendar_sync(ORG, &CalendarSyncRequest::default()).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyRunning(_)));
}

#[tokio::test]
async fn calendar_blocks_are_idempotent() {
    let channel = populated_channel()
        .with_availability(vec![
            json!({"listingId": "L1", "startDate": day(3), "endDate": day(6), "status": "blocked"}),
            json!({"listingId": "L2", "startDate": day(8), "endDate": day(9), "blocked": true, "type": "maintenance"}),
            json!({"listingId": "L1", "date": day(1), "status": "available"}),
        ])
        .with_rates(vec![json!({"date": day(1), "price": 50000})]);
    let h = harness(channel).await;
    h.service.full_sync(ORG, &wide_window()).await.unwrap();

    let first = h.service.calendar_sync(ORG, &CalendarSyncRequest::default()).await.unwrap();
    assert!(first.success, "errors: {:?}", first.stats.errors);
    assert_eq!(first.stats.availability.fetched, 3);
    assert_eq!(first.stats.blocks.fetched, 2);
    assert_eq!(first.stats.blocks.created, 2);
    assert_eq!(first.stats.rates.fetched, 1);

    let second = h.service.calendar_sync(ORG, &CalendarSyncRequest::default()).await.unwrap();
    assert!(second.success);
    assert_eq!(second.stats.blocks.created, 0);

    let blocks = h.store.list_blocks(ORG).await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].nights, 3);
    assert_eq!(blocks[1].reason, "Manutenção (Stays.net)");
}

#[tokio::test]
async fn calendar_steps_are_isolated() {
    let channel = populated_channel()
        .with_rates(vec![json!({"date": day(1)})])
        .failing(Endpoint::Availability, "timeout");
    let h = harness(channel).await;

    let outcome = h.service.calendar_sync(ORG, &CalendarSyncRequest::default()).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stats.rates.fetched, 1);
    assert_eq!(outcome.stats.errors.len(), 1);
}

#[tokio::test]
async fn block_for_unknown_listing_fails_individually() {
    let channel = FakeChannel::new().with_availability(vec![
        json!({"listingId": "nope", "startDate": day(3), "endDate": day(4), "status": "blocked"}),
    ]);
    let h = harness(channel).await;

    let outcome = h.service.calendar_sync(ORG, &CalendarSyncRequest::default()).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stats.blocks.failed, 1);
    assert!(h.store.list_blocks(ORG).await.unwrap().is_empty());
}

#[tokio::test]
async fn owners_endpoint_unavailable_short_circuits() {
    let h = harness(populated_channel()).await;

    let outcome = h.service.owners_sync(ORG).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.stats.is_none());
    assert_eq!(outcome.error.as_deref(), Some("Endpoint not available"));
}

#[tokio::test]
async fn owners_upsert_by_id() {
    let channel = FakeChannel::new().with_owners(vec![
        json!({"_id": "O1", "name": "Ana Lima", "email": "ana@example.com"}),
        json!({"name": "no id"}),
    ]);
    let h = harness(channel).await;

    let first = h.service.owners_sync(ORG).await.unwrap();
    let stats = first.stats.unwrap();
    assert!(!first.success);
    assert_eq!(stats.owners.created, 1);
    assert_eq!(stats.owners.failed, 1);

    let second = h.service.owners_sync(ORG).await.unwrap();
    assert_eq!(second.stats.unwrap().owners.updated, 1);
    assert_eq!(h.store.count_owners(ORG).await.unwrap(), 1);
}

#[tokio::test]
async fn auto_sync_runs_reservations_and_calendar() {
    let h = harness(populated_channel()).await;

    let outcome = h.service.auto_sync(ORG).await.unwrap();

    assert!(outcome.success);
    // R3 arrives 20 days out, inside the 30-day window.
    assert_eq!(outcome.reservations.stats.reservations.created, 3);
    assert!(outcome.calendar.success);
    assert_eq!(h.channel.calls(Endpoint::Availability), 1);
}

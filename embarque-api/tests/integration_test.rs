use std::sync::Arc;

use embarque_api::AppState;
use embarque_core::booking::Leg;
use embarque_core::palette::TagPalette;
use embarque_core::store::BookingStore;
use embarque_core::OrganizerError;
use embarque_manifest::{CityGroupBy, OrganizeMode, ReorderScope};
use embarque_shared::ManifestEventKind;
use embarque_store::{fixtures, MemoryStore};

async fn demo_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    fixtures::seed_demo(&store).await;
    AppState::new(store, TagPalette::default())
}

const TRIP: i64 = fixtures::DEMO_TRIP_ID;

#[tokio::test]
async fn test_default_manifest_groups_family_contiguously() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();

    let tree = organizer.hierarchy().await;
    assert_eq!(tree.mode, OrganizeMode::Default);
    assert_eq!(tree.buckets.len(), 1);

    let groups = &tree.buckets[0].sub_buckets[0].groups;
    assert_eq!(groups[0].booking_ids(), vec![101, 102]);
    assert!(groups[0].is_linked());
    assert_eq!(tree.flat_ids(), vec![101, 102, 103, 104, 105]);
}

#[tokio::test]
async fn test_city_manifest_buckets_and_general_sub_buckets() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();
    organizer
        .set_view(OrganizeMode::City, CityGroupBy::Pickup)
        .await;

    let tree = organizer.hierarchy().await;
    let labels: Vec<&str> = tree.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["FEIRA DE SANTANA", "SALVADOR"]);

    let feira = &tree.buckets[0];
    let feira_subs: Vec<&str> = feira.sub_buckets.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(feira_subs, vec!["GENERAL", "KALILANDIA"]);

    let salvador = &tree.buckets[1];
    let salvador_subs: Vec<&str> = salvador
        .sub_buckets
        .iter()
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(salvador_subs, vec!["GENERAL", "CENTRO"]);
    assert_eq!(salvador.sub_buckets[1].groups[0].booking_ids(), vec![101, 102]);
}

#[tokio::test]
async fn test_reorder_persists_dense_canonical_order() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();

    let scope = organizer
        .reorder(&[103, 101, 102, 105, 104])
        .await
        .unwrap();
    assert_eq!(scope, ReorderScope::Canonical);

    let bookings = state.store.list_bookings(TRIP).await.unwrap();
    let ids: Vec<i64> = bookings.iter().map(|b| b.id()).collect();
    assert_eq!(ids, vec![103, 101, 102, 105, 104]);
    let mut indices: Vec<i64> = bookings.iter().map(|b| b.order_index()).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_link_then_tag_cascades_across_three_members() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();

    // 103 sits right below the family span {101, 102}.
    organizer.link(103, 101).await.unwrap();
    organizer.set_tag(102, Some("#2196f3")).await.unwrap();

    let bookings = state.store.list_bookings(TRIP).await.unwrap();
    for id in [101, 102, 103] {
        let booking = bookings.iter().find(|b| b.id() == id).unwrap();
        assert_eq!(booking.core().tag_color.as_deref(), Some("#2196f3"));
    }
}

#[tokio::test]
async fn test_seat_conflict_leaves_both_bookings_intact() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();

    organizer.bind_seat(103, 1, "12").await.unwrap();
    let err = organizer.bind_seat(104, 1, "12").await.unwrap_err();
    assert!(matches!(err, OrganizerError::Conflict(_)));

    let bookings = state.store.list_bookings(TRIP).await.unwrap();
    let seat_of = |id: i64| {
        bookings
            .iter()
            .find(|b| b.id() == id)
            .and_then(|b| b.core().seat.clone())
    };
    assert_eq!(seat_of(103).unwrap().seat_number, "12");
    assert!(seat_of(104).is_none());
    organizer.check_seat_invariants().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_expands_family_and_clears_driver() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();

    // Selecting one family member drags the whole family; the parcel joins
    // alone.
    let expanded = organizer.expand_selection(&[101, 105]).await;
    assert_eq!(expanded, vec![101, 102, 105]);

    let report = organizer
        .bulk_assign(&[101, 105], Some(5), Leg::Pickup)
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.applied, vec![101, 102, 105]);

    // Clearing is an explicit assignment of "no driver" to the same leg.
    organizer
        .bulk_assign(&[101], None, Leg::Pickup)
        .await
        .unwrap();

    let bookings = state.store.list_bookings(TRIP).await.unwrap();
    let collector_of = |id: i64| {
        bookings
            .iter()
            .find(|b| b.id() == id)
            .and_then(|b| b.core().collector_driver.clone())
    };
    assert!(collector_of(101).is_none());
    assert!(collector_of(102).is_none());
    assert_eq!(collector_of(105).map(|d| d.id), Some(5));
}

#[tokio::test]
async fn test_event_stream_reports_mutations_per_trip() {
    let state = demo_state().await;
    let organizer = state.organizer(TRIP).await.unwrap();
    let mut events = state.events.subscribe();

    organizer.bind_seat(103, 2, "1").await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.trip_id, TRIP);
    assert!(matches!(
        event.kind,
        ManifestEventKind::SeatBound { booking_id: 103, .. }
    ));
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use embarque_core::booking::{Booking, Leg, LuggageSummary, Vehicle};
use embarque_core::palette::TagPalette;
use embarque_core::store::{BookingStore, BulkAssignReport};
use embarque_core::{OrganizerError, OrganizerResult};
use embarque_shared::{ManifestEvent, ManifestEventKind};

use crate::dispatch::{expand_selection, DispatchService};
use crate::hierarchy::{build_hierarchy, CityGroupBy, Hierarchy, OrganizeMode};
use crate::linking::LinkingService;
use crate::ordering::{OrderingService, ReorderScope};
use crate::seating::{self, build_seat_map, SeatMap, SeatState, SeatingService};

struct ViewState {
    mode: OrganizeMode,
    city_group_by: CityGroupBy,
    bookings: Vec<Booking>,
    luggage: HashMap<i64, LuggageSummary>,
    vehicles: Vec<Vehicle>,
    version: u64,
    cache: Option<CachedTree>,
}

struct CachedTree {
    mode: OrganizeMode,
    city_group_by: CityGroupBy,
    version: u64,
    tree: Hierarchy,
}

/// Per-trip entry point for the manifest screens. Owns the last known-good
/// snapshot, memoizes the hierarchy on (snapshot, mode, city grouping), and
/// serializes mutations through one lock so same-trip operations apply in
/// the order the user issued them; a duplicate submission simply queues
/// behind the first. On any failed mutation the snapshot is left untouched,
/// so the view rolls back to the last known-good state, and a failure event
/// is broadcast instead of silently dropping the user's intent.
pub struct ManifestOrganizer<S: BookingStore> {
    store: Arc<S>,
    trip_id: i64,
    linking: LinkingService<S>,
    ordering: OrderingService<S>,
    seating: SeatingService<S>,
    dispatch: DispatchService<S>,
    events: broadcast::Sender<ManifestEvent>,
    mutation: Mutex<()>,
    state: Mutex<ViewState>,
}

impl<S: BookingStore> ManifestOrganizer<S> {
    pub fn new(
        store: Arc<S>,
        trip_id: i64,
        palette: TagPalette,
        events: broadcast::Sender<ManifestEvent>,
    ) -> Self {
        Self {
            linking: LinkingService::new(store.clone(), palette),
            ordering: OrderingService::new(store.clone()),
            seating: SeatingService::new(store.clone()),
            dispatch: DispatchService::new(store.clone()),
            store,
            trip_id,
            events,
            mutation: Mutex::new(()),
            state: Mutex::new(ViewState {
                mode: OrganizeMode::Default,
                city_group_by: CityGroupBy::Pickup,
                bookings: Vec::new(),
                luggage: HashMap::new(),
                vehicles: Vec::new(),
                version: 0,
                cache: None,
            }),
        }
    }

    pub fn trip_id(&self) -> i64 {
        self.trip_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManifestEvent> {
        self.events.subscribe()
    }

    /// Re-read the trip from the store: bookings, per-booking luggage
    /// rollups, and the vehicle roster.
    pub async fn refresh(&self) -> OrganizerResult<()> {
        let bookings = self.store.list_bookings(self.trip_id).await?;

        let mut luggage = HashMap::new();
        for booking in &bookings {
            let items = self.store.list_luggage(booking.id()).await?;
            if !items.is_empty() {
                luggage.insert(booking.id(), LuggageSummary::from_items(&items));
            }
        }
        let vehicles = self.store.list_vehicles(self.trip_id).await?;

        let mut state = self.state.lock().await;
        state.bookings = bookings;
        state.luggage = luggage;
        state.vehicles = vehicles;
        state.version += 1;
        state.cache = None;
        Ok(())
    }

    pub async fn set_view(&self, mode: OrganizeMode, city_group_by: CityGroupBy) {
        let mut state = self.state.lock().await;
        state.mode = mode;
        state.city_group_by = city_group_by;
    }

    pub async fn view(&self) -> (OrganizeMode, CityGroupBy) {
        let state = self.state.lock().await;
        (state.mode, state.city_group_by)
    }

    /// The manifest tree for the current view, rebuilt only when the
    /// snapshot or the view selection changed.
    pub async fn hierarchy(&self) -> Hierarchy {
        let mut state = self.state.lock().await;
        if let Some(cached) = &state.cache {
            if cached.mode == state.mode
                && cached.city_group_by == state.city_group_by
                && cached.version == state.version
            {
                return cached.tree.clone();
            }
        }

        let tree = build_hierarchy(
            &state.bookings,
            &state.luggage,
            state.mode,
            state.city_group_by,
        );
        state.cache = Some(CachedTree {
            mode: state.mode,
            city_group_by: state.city_group_by,
            version: state.version,
            tree: tree.clone(),
        });
        tree
    }

    pub async fn seat_map(&self, vehicle_id: i64) -> OrganizerResult<SeatMap> {
        let state = self.state.lock().await;
        let vehicle = state
            .vehicles
            .iter()
            .find(|v| v.id == vehicle_id)
            .ok_or_else(|| {
                OrganizerError::NotFound(format!("vehicle {} not on trip", vehicle_id))
            })?;
        Ok(build_seat_map(vehicle, &state.bookings))
    }

    pub async fn inspect_seat(
        &self,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<SeatState> {
        self.seating
            .inspect(self.trip_id, vehicle_id, seat_number)
            .await
    }

    /// Preview of what a raw selection will actually touch once the group
    /// invariant is applied.
    pub async fn expand_selection(&self, ids: &[i64]) -> Vec<i64> {
        let state = self.state.lock().await;
        expand_selection(ids, &state.bookings).into_iter().collect()
    }

    pub async fn check_seat_invariants(&self) -> OrganizerResult<()> {
        let state = self.state.lock().await;
        seating::check_invariants(&state.bookings)
    }

    pub async fn reorder(&self, new_flat_order: &[i64]) -> OrganizerResult<ReorderScope> {
        let _guard = self.mutation.lock().await;
        let (mode, _) = self.view().await;
        match self
            .ordering
            .apply_reorder(self.trip_id, new_flat_order, mode)
            .await
        {
            Ok(scope) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::OrderChanged {
                    scope: scope.as_str().to_string(),
                });
                Ok(scope)
            }
            Err(err) => self.fail("reorder", err),
        }
    }

    pub async fn move_before(
        &self,
        node_id: i64,
        target_id: i64,
    ) -> OrganizerResult<ReorderScope> {
        let _guard = self.mutation.lock().await;
        let (mode, city_group_by) = self.view().await;
        match self
            .ordering
            .move_before(self.trip_id, node_id, target_id, mode, city_group_by)
            .await
        {
            Ok(scope) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::OrderChanged {
                    scope: scope.as_str().to_string(),
                });
                Ok(scope)
            }
            Err(err) => self.fail("move", err),
        }
    }

    pub async fn move_to_end(&self, node_id: i64) -> OrganizerResult<ReorderScope> {
        let _guard = self.mutation.lock().await;
        let (mode, city_group_by) = self.view().await;
        match self
            .ordering
            .move_to_end(self.trip_id, node_id, mode, city_group_by)
            .await
        {
            Ok(scope) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::OrderChanged {
                    scope: scope.as_str().to_string(),
                });
                Ok(scope)
            }
            Err(err) => self.fail("move", err),
        }
    }

    /// Copy the city-view order into the canonical order. User action only.
    pub async fn sync_city_order(&self) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        let (_, city_group_by) = self.view().await;
        match self
            .ordering
            .sync_city_order(self.trip_id, city_group_by)
            .await
        {
            Ok(()) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::OrderChanged {
                    scope: ReorderScope::Canonical.as_str().to_string(),
                });
                Ok(())
            }
            Err(err) => self.fail("sync_city_order", err),
        }
    }

    pub async fn link(&self, target_id: i64, anchor_id: i64) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        match self.linking.link(self.trip_id, target_id, anchor_id).await {
            Ok(()) => {
                self.refresh().await?;
                let state = self.state.lock().await;
                let group_id = state
                    .bookings
                    .iter()
                    .find(|b| b.id() == target_id)
                    .and_then(|b| b.group_id());
                drop(state);
                if let Some(group_id) = group_id {
                    self.emit(ManifestEventKind::GroupLinked {
                        booking_id: target_id,
                        anchor_id,
                        group_id,
                    });
                }
                Ok(())
            }
            Err(err) => self.fail("link", err),
        }
    }

    pub async fn unlink(&self, booking_id: i64) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        match self.linking.unlink(self.trip_id, booking_id).await {
            Ok(()) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::GroupUnlinked { booking_id });
                Ok(())
            }
            Err(err) => self.fail("unlink", err),
        }
    }

    pub async fn set_tag(&self, booking_id: i64, color: Option<&str>) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        match self.linking.set_tag(self.trip_id, booking_id, color).await {
            Ok(affected) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::TagChanged {
                    booking_ids: affected,
                    color: color.map(|c| c.to_string()),
                });
                Ok(())
            }
            Err(err) => self.fail("set_tag", err),
        }
    }

    pub async fn bind_seat(
        &self,
        booking_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        match self
            .seating
            .bind(self.trip_id, booking_id, vehicle_id, seat_number)
            .await
        {
            Ok(()) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::SeatBound {
                    booking_id,
                    vehicle_id,
                    seat_number: seat_number.to_string(),
                });
                Ok(())
            }
            Err(err) => self.fail("bind_seat", err),
        }
    }

    pub async fn unbind_seat(&self, booking_id: i64) -> OrganizerResult<()> {
        let _guard = self.mutation.lock().await;
        match self.seating.unbind(self.trip_id, booking_id).await {
            Ok(()) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::SeatUnbound { booking_id });
                Ok(())
            }
            Err(err) => self.fail("unbind_seat", err),
        }
    }

    /// Bulk driver assignment over an expanded selection. Successes stay
    /// committed on partial failure; the report says which rows failed.
    pub async fn bulk_assign(
        &self,
        selection: &[i64],
        driver_id: Option<i64>,
        leg: Leg,
    ) -> OrganizerResult<BulkAssignReport> {
        let _guard = self.mutation.lock().await;
        match self
            .dispatch
            .bulk_assign(self.trip_id, selection, driver_id, leg)
            .await
        {
            Ok(report) => {
                self.refresh().await?;
                self.emit(ManifestEventKind::DriversAssigned {
                    booking_ids: report.applied.clone(),
                    driver_id,
                    leg: leg.to_string(),
                });
                if !report.is_clean() {
                    self.emit(ManifestEventKind::MutationFailed {
                        operation: "bulk_assign".to_string(),
                        message: format!("{} bookings failed", report.failed.len()),
                    });
                }
                Ok(report)
            }
            Err(err) => self.fail("bulk_assign", err),
        }
    }

    fn emit(&self, kind: ManifestEventKind) {
        let _ = self.events.send(ManifestEvent {
            trip_id: self.trip_id,
            kind,
            occurred_at: Utc::now().timestamp(),
        });
    }

    fn fail<T>(&self, operation: &str, err: OrganizerError) -> OrganizerResult<T> {
        warn!(trip_id = self.trip_id, operation, %err, "mutation failed, view kept at last known-good state");
        self.emit(ManifestEventKind::MutationFailed {
            operation: operation.to_string(),
            message: err.to_string(),
        });
        Err(err)
    }
}

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use embarque_core::booking::{Booking, Leg, LuggageItem, PartyRef, SeatAssignment, Vehicle};
use embarque_core::store::{BookingStore, BulkAssignReport, FailedAssignment};
use embarque_core::{OrganizerError, OrganizerResult};

#[derive(Default)]
struct TripRecord {
    bookings: Vec<Booking>,
    vehicles: Vec<Vehicle>,
}

#[derive(Default)]
struct Inner {
    trips: HashMap<i64, TripRecord>,
    luggage: HashMap<i64, Vec<LuggageItem>>,
    drivers: HashMap<i64, String>,
}

/// Reference `BookingStore` backed by process memory. Stands in for the
/// remote booking service in tests and demo runs; enforces the same
/// row-level rules that service would (seat occupancy, dense reindexing,
/// per-row bulk writes).
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one trip's bookings, vehicles and luggage wholesale.
    pub async fn seed_trip(
        &self,
        trip_id: i64,
        bookings: Vec<Booking>,
        vehicles: Vec<Vehicle>,
        luggage: Vec<LuggageItem>,
    ) {
        let mut inner = self.inner.write().await;
        for item in luggage {
            inner.luggage.entry(item.booking_id).or_default().push(item);
        }
        inner.trips.insert(trip_id, TripRecord { bookings, vehicles });
    }

    pub async fn seed_drivers(&self, drivers: Vec<PartyRef>) {
        let mut inner = self.inner.write().await;
        for driver in drivers {
            inner.drivers.insert(driver.id, driver.name);
        }
    }
}

impl Inner {
    fn trip(&self, trip_id: i64) -> OrganizerResult<&TripRecord> {
        self.trips
            .get(&trip_id)
            .ok_or_else(|| OrganizerError::NotFound(format!("trip {} not found", trip_id)))
    }

    fn trip_mut(&mut self, trip_id: i64) -> OrganizerResult<&mut TripRecord> {
        self.trips
            .get_mut(&trip_id)
            .ok_or_else(|| OrganizerError::NotFound(format!("trip {} not found", trip_id)))
    }

    fn booking_mut(&mut self, booking_id: i64) -> OrganizerResult<&mut Booking> {
        self.trips
            .values_mut()
            .flat_map(|t| t.bookings.iter_mut())
            .find(|b| b.id() == booking_id)
            .ok_or_else(|| OrganizerError::NotFound(format!("booking {} not found", booking_id)))
    }

    fn driver_ref(&self, driver_id: i64) -> PartyRef {
        PartyRef {
            id: driver_id,
            name: self
                .drivers
                .get(&driver_id)
                .cloned()
                .unwrap_or_else(|| format!("Driver {}", driver_id)),
        }
    }
}

fn check_permutation(record: &TripRecord, ordered_ids: &[i64]) -> OrganizerResult<()> {
    let current: HashSet<i64> = record.bookings.iter().map(|b| b.id()).collect();
    let proposed: HashSet<i64> = ordered_ids.iter().copied().collect();
    if proposed.len() != ordered_ids.len() || current != proposed {
        return Err(OrganizerError::Validation(
            "order update must list every booking on the trip exactly once".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn list_bookings(&self, trip_id: i64) -> OrganizerResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings = inner.trip(trip_id)?.bookings.clone();
        bookings.sort_by_key(|b| (b.order_index(), b.id()));
        Ok(bookings)
    }

    async fn list_luggage(&self, booking_id: i64) -> OrganizerResult<Vec<LuggageItem>> {
        let inner = self.inner.read().await;
        Ok(inner.luggage.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn list_vehicles(&self, trip_id: i64) -> OrganizerResult<Vec<Vehicle>> {
        let inner = self.inner.read().await;
        Ok(inner.trip(trip_id)?.vehicles.clone())
    }

    async fn update_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner.trip_mut(trip_id)?;
        check_permutation(record, ordered_ids)?;

        let position: HashMap<i64, i64> = ordered_ids
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx as i64))
            .collect();
        for booking in &mut record.bookings {
            let core = booking.core_mut();
            core.order_index = position[&core.id];
            core.updated_at = Utc::now();
        }
        tracing::debug!(trip_id, count = ordered_ids.len(), "canonical order rewritten");
        Ok(())
    }

    async fn update_city_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner.trip_mut(trip_id)?;
        check_permutation(record, ordered_ids)?;

        let position: HashMap<i64, i64> = ordered_ids
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx as i64))
            .collect();
        for booking in &mut record.bookings {
            let core = booking.core_mut();
            core.city_order_index = Some(position[&core.id]);
            core.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_tag(&self, booking_id: i64, color: Option<&str>) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;
        let core = inner.booking_mut(booking_id)?.core_mut();
        core.tag_color = color.map(|c| c.to_string());
        core.updated_at = Utc::now();
        Ok(())
    }

    async fn link(&self, booking_id: i64, anchor_id: i64) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;

        let gid = {
            let anchor = inner.booking_mut(anchor_id)?;
            match anchor.group_id() {
                Some(gid) => gid,
                None => {
                    let gid = Uuid::new_v4();
                    anchor.core_mut().group_id = Some(gid);
                    anchor.core_mut().updated_at = Utc::now();
                    gid
                }
            }
        };

        let target = inner.booking_mut(booking_id)?;
        target.core_mut().group_id = Some(gid);
        target.core_mut().updated_at = Utc::now();
        Ok(())
    }

    async fn unlink(&self, booking_id: i64) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;
        let core = inner.booking_mut(booking_id)?.core_mut();
        core.group_id = None;
        core.updated_at = Utc::now();
        Ok(())
    }

    async fn bind_seat(
        &self,
        booking_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;

        // The occupancy rule is enforced at write time as well; a second
        // session racing this one surfaces as a conflict, not an overwrite.
        let occupant = inner
            .trips
            .values()
            .flat_map(|t| t.bookings.iter())
            .find(|b| {
                b.core()
                    .seat
                    .as_ref()
                    .map(|s| s.vehicle_id == vehicle_id && s.seat_number == seat_number)
                    .unwrap_or(false)
            })
            .map(|b| b.id());
        if let Some(occupant) = occupant {
            if occupant != booking_id {
                return Err(OrganizerError::Conflict(format!(
                    "seat {} on vehicle {} is occupied by booking {}",
                    seat_number, vehicle_id, occupant
                )));
            }
        }

        let core = inner.booking_mut(booking_id)?.core_mut();
        core.seat = Some(SeatAssignment {
            vehicle_id,
            seat_number: seat_number.to_string(),
        });
        core.updated_at = Utc::now();
        tracing::debug!(booking_id, vehicle_id, seat_number, "seat written");
        Ok(())
    }

    async fn unbind_seat(&self, booking_id: i64) -> OrganizerResult<()> {
        let mut inner = self.inner.write().await;
        let core = inner.booking_mut(booking_id)?.core_mut();
        core.seat = None;
        core.updated_at = Utc::now();
        Ok(())
    }

    async fn bulk_assign_driver(
        &self,
        passenger_ids: &[i64],
        parcel_ids: &[i64],
        driver_id: Option<i64>,
        leg: Leg,
    ) -> OrganizerResult<BulkAssignReport> {
        let mut inner = self.inner.write().await;
        let driver = driver_id.map(|id| inner.driver_ref(id));

        let mut report = BulkAssignReport::default();
        for &id in passenger_ids.iter().chain(parcel_ids) {
            match inner.booking_mut(id) {
                Ok(booking) => {
                    let core = booking.core_mut();
                    match leg {
                        Leg::Pickup => core.collector_driver = driver.clone(),
                        Leg::Delivery => core.deliverer_driver = driver.clone(),
                    }
                    core.updated_at = Utc::now();
                    report.applied.push(id);
                }
                Err(err) => report.failed.push(FailedAssignment {
                    booking_id: id,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(report)
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use embarque_core::booking::{Booking, Leg};
use embarque_core::store::{BookingStore, BulkAssignReport};
use embarque_core::{OrganizerError, OrganizerResult};

/// The bookings a bulk assignment will touch. Selecting any member of a
/// multi-member linked group selects the whole group; parcels and ungrouped
/// passengers select alone.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: BTreeSet<i64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }

    pub fn contains(&self, booking_id: i64) -> bool {
        self.ids.contains(&booking_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Toggle a booking in or out. Both directions move the booking's whole
    /// expansion unit.
    pub fn toggle(&mut self, booking_id: i64, bookings: &[Booking]) {
        let unit = expansion_unit(booking_id, bookings);
        if self.ids.contains(&booking_id) {
            for id in unit {
                self.ids.remove(&id);
            }
        } else {
            self.ids.extend(unit);
        }
    }
}

/// The set of bookings that selecting `booking_id` actually selects: every
/// passenger sharing its group identifier, or just itself. Parcels never
/// expand.
pub fn expansion_unit(booking_id: i64, bookings: &[Booking]) -> Vec<i64> {
    let booking = match bookings.iter().find(|b| b.id() == booking_id) {
        Some(b) => b,
        None => return vec![booking_id],
    };

    match booking.group_id() {
        Some(gid) if booking.is_passenger() => bookings
            .iter()
            .filter(|b| b.is_passenger() && b.group_id() == Some(gid))
            .map(|b| b.id())
            .collect(),
        _ => vec![booking_id],
    }
}

/// Expand a raw id set to honor the group invariant.
pub fn expand_selection(ids: &[i64], bookings: &[Booking]) -> BTreeSet<i64> {
    ids.iter()
        .flat_map(|&id| expansion_unit(id, bookings))
        .collect()
}

/// Applies one driver assignment (or removal) across a multi-selection of
/// passengers and parcels.
pub struct DispatchService<S> {
    store: Arc<S>,
}

impl<S: BookingStore> DispatchService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Assign `driver_id` to the chosen leg of every selected booking;
    /// `None` clears the leg's driver. The selection is re-expanded against
    /// a fresh snapshot so a stale client selection can never split a group.
    /// Row updates are independent; the report lists partial failures and
    /// successes stay committed.
    pub async fn bulk_assign(
        &self,
        trip_id: i64,
        selection: &[i64],
        driver_id: Option<i64>,
        leg: Leg,
    ) -> OrganizerResult<BulkAssignReport> {
        if selection.is_empty() {
            return Err(OrganizerError::Validation(
                "nothing selected for dispatch".to_string(),
            ));
        }

        let snapshot = self.store.list_bookings(trip_id).await?;
        let expanded = expand_selection(selection, &snapshot);

        let mut passenger_ids = Vec::new();
        let mut parcel_ids = Vec::new();
        for id in expanded {
            let booking = snapshot.iter().find(|b| b.id() == id).ok_or_else(|| {
                OrganizerError::NotFound(format!("booking {} not on trip", id))
            })?;
            if booking.is_passenger() {
                passenger_ids.push(id);
            } else {
                parcel_ids.push(id);
            }
        }

        let report = self
            .store
            .bulk_assign_driver(&passenger_ids, &parcel_ids, driver_id, leg)
            .await?;

        if report.is_clean() {
            info!(
                trip_id,
                ?driver_id,
                %leg,
                count = report.applied.len(),
                "bulk driver assignment applied"
            );
        } else {
            warn!(
                trip_id,
                ?driver_id,
                %leg,
                applied = report.applied.len(),
                failed = report.failed.len(),
                "bulk driver assignment partially failed"
            );
        }
        Ok(report)
    }
}

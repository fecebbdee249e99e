use async_trait::async_trait;

use crate::booking::{Booking, Leg, LuggageItem, Vehicle};
use crate::OrganizerResult;

/// Outcome of a bulk driver assignment. Each row is written independently;
/// successes stay committed even when siblings fail.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BulkAssignReport {
    pub applied: Vec<i64>,
    pub failed: Vec<FailedAssignment>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FailedAssignment {
    pub booking_id: i64,
    pub reason: String,
}

impl BulkAssignReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The booking store is the sole shared mutable resource. Every read is a
/// fresh snapshot; every write is a best-effort update with no optimistic
/// lock token. Concurrent sessions can overwrite each other.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn list_bookings(&self, trip_id: i64) -> OrganizerResult<Vec<Booking>>;

    async fn list_luggage(&self, booking_id: i64) -> OrganizerResult<Vec<LuggageItem>>;

    async fn list_vehicles(&self, trip_id: i64) -> OrganizerResult<Vec<Vehicle>>;

    /// Persist a new canonical order. The store reassigns dense indices
    /// 0..n-1 following the given sequence.
    async fn update_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()>;

    /// Persist a new city-view order. Canonical order is untouched.
    async fn update_city_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()>;

    /// Write a tag color on a single booking. Cascading across a linked
    /// group is the caller's responsibility.
    async fn set_tag(&self, booking_id: i64, color: Option<&str>) -> OrganizerResult<()>;

    /// Attach `booking_id` to the anchor's group, minting the anchor's group
    /// identifier when absent.
    async fn link(&self, booking_id: i64, anchor_id: i64) -> OrganizerResult<()>;

    /// Clear the booking's group identifier.
    async fn unlink(&self, booking_id: i64) -> OrganizerResult<()>;

    /// Bind a booking to a seat. The store rejects a seat held by another
    /// booking with a conflict; a lost race surfaces here.
    async fn bind_seat(
        &self,
        booking_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<()>;

    /// Clear seat and vehicle together.
    async fn unbind_seat(&self, booking_id: i64) -> OrganizerResult<()>;

    /// Assign (or clear, with `driver_id = None`) the driver on one leg for
    /// every listed booking. Rows are independent; the report tells which
    /// ones failed.
    async fn bulk_assign_driver(
        &self,
        passenger_ids: &[i64],
        parcel_ids: &[i64],
        driver_id: Option<i64>,
        leg: Leg,
    ) -> OrganizerResult<BulkAssignReport>;
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use embarque_core::booking::{
    Address, Booking, BookingCore, Leg, LuggageItem, ParcelBooking, PassengerBooking, PartyRef,
    Vehicle,
};
use embarque_core::store::{BookingStore, BulkAssignReport};
use embarque_core::{OrganizerError, OrganizerResult};
use embarque_store::MemoryStore;

pub(crate) const TRIP: i64 = 42;

fn core(id: i64, order: i64) -> BookingCore {
    BookingCore {
        id,
        trip_id: TRIP,
        pickup: None,
        delivery: None,
        collector_driver: None,
        deliverer_driver: None,
        broker: None,
        amount_cents: 12_000,
        paid: false,
        order_index: order,
        city_order_index: None,
        group_id: None,
        tag_color: None,
        seat: None,
        updated_at: Utc::now(),
    }
}

pub(crate) fn passenger(id: i64, order: i64, name: &str) -> Booking {
    Booking::Passenger(PassengerBooking {
        core: core(id, order),
        passenger_name: name.to_string(),
        phone: None,
    })
}

pub(crate) fn parcel(id: i64, order: i64, recipient: &str) -> Booking {
    Booking::Parcel(ParcelBooking {
        core: core(id, order),
        sender_name: "Remetente".to_string(),
        recipient_name: recipient.to_string(),
        description: None,
    })
}

pub(crate) fn with_pickup(mut booking: Booking, city: &str, neighborhood: &str) -> Booking {
    booking.core_mut().pickup = Some(Address {
        street: None,
        number: None,
        city: Some(city.to_string()),
        neighborhood: Some(neighborhood.to_string()),
        reference: None,
    });
    booking
}

pub(crate) fn with_collector(mut booking: Booking, id: i64, name: &str) -> Booking {
    booking.core_mut().collector_driver = Some(PartyRef {
        id,
        name: name.to_string(),
    });
    booking
}

/// Delegating store that fails exactly the nth `set_tag` call. Used to
/// exercise rollback paths; restore writes after the failure go through.
pub(crate) struct FlakyTagStore {
    pub inner: Arc<MemoryStore>,
    fail_from: usize,
    calls: AtomicUsize,
}

impl FlakyTagStore {
    pub(crate) fn failing_from(inner: Arc<MemoryStore>, fail_from: usize) -> Self {
        Self {
            inner,
            fail_from,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BookingStore for FlakyTagStore {
    async fn list_bookings(&self, trip_id: i64) -> OrganizerResult<Vec<Booking>> {
        self.inner.list_bookings(trip_id).await
    }

    async fn list_luggage(&self, booking_id: i64) -> OrganizerResult<Vec<LuggageItem>> {
        self.inner.list_luggage(booking_id).await
    }

    async fn list_vehicles(&self, trip_id: i64) -> OrganizerResult<Vec<Vehicle>> {
        self.inner.list_vehicles(trip_id).await
    }

    async fn update_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()> {
        self.inner.update_order(trip_id, ordered_ids).await
    }

    async fn update_city_order(&self, trip_id: i64, ordered_ids: &[i64]) -> OrganizerResult<()> {
        self.inner.update_city_order(trip_id, ordered_ids).await
    }

    async fn set_tag(&self, booking_id: i64, color: Option<&str>) -> OrganizerResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call + 1 == self.fail_from {
            return Err(OrganizerError::Transport(
                "simulated write failure".to_string(),
            ));
        }
        self.inner.set_tag(booking_id, color).await
    }

    async fn link(&self, booking_id: i64, anchor_id: i64) -> OrganizerResult<()> {
        self.inner.link(booking_id, anchor_id).await
    }

    async fn unlink(&self, booking_id: i64) -> OrganizerResult<()> {
        self.inner.unlink(booking_id).await
    }

    async fn bind_seat(
        &self,
        booking_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<()> {
        self.inner.bind_seat(booking_id, vehicle_id, seat_number).await
    }

    async fn unbind_seat(&self, booking_id: i64) -> OrganizerResult<()> {
        self.inner.unbind_seat(booking_id).await
    }

    async fn bulk_assign_driver(
        &self,
        passenger_ids: &[i64],
        parcel_ids: &[i64],
        driver_id: Option<i64>,
        leg: Leg,
    ) -> OrganizerResult<BulkAssignReport> {
        self.inner
            .bulk_assign_driver(passenger_ids, parcel_ids, driver_id, leg)
            .await
    }
}

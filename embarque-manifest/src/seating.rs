use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use embarque_core::booking::{Booking, SeatAssignment, Vehicle};
use embarque_core::store::BookingStore;
use embarque_core::{OrganizerError, OrganizerResult};

/// State of one (vehicle, seat) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SeatState {
    Free,
    Occupied { booking_id: i64, label: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatSlot {
    pub seat_number: String,
    pub state: SeatState,
    /// False for a seat referenced by a booking but absent from the
    /// vehicle's layout; shown instead of dropped.
    pub in_layout: bool,
}

/// Derived view of one vehicle's seats. Rebuilt from bookings on demand,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub vehicle_id: i64,
    pub seats: Vec<SeatSlot>,
}

impl SeatMap {
    pub fn occupied_count(&self) -> usize {
        self.seats
            .iter()
            .filter(|s| matches!(s.state, SeatState::Occupied { .. }))
            .count()
    }
}

/// Build the seat map for one vehicle from a booking snapshot.
pub fn build_seat_map(vehicle: &Vehicle, bookings: &[Booking]) -> SeatMap {
    let mut occupants: HashMap<&str, &Booking> = HashMap::new();
    for booking in bookings {
        if let Some(seat) = &booking.core().seat {
            if seat.vehicle_id == vehicle.id {
                occupants.insert(seat.seat_number.as_str(), booking);
            }
        }
    }

    let mut seats: Vec<SeatSlot> = vehicle
        .seat_numbers
        .iter()
        .map(|number| SeatSlot {
            seat_number: number.clone(),
            state: slot_state(occupants.remove(number.as_str())),
            in_layout: true,
        })
        .collect();

    // Whatever is left points at seats outside the layout.
    let mut strays: Vec<(&str, &Booking)> = occupants.into_iter().collect();
    strays.sort_by_key(|(number, _)| number.to_string());
    for (number, booking) in strays {
        seats.push(SeatSlot {
            seat_number: number.to_string(),
            state: slot_state(Some(booking)),
            in_layout: false,
        });
    }

    SeatMap {
        vehicle_id: vehicle.id,
        seats,
    }
}

fn slot_state(occupant: Option<&Booking>) -> SeatState {
    match occupant {
        Some(booking) => SeatState::Occupied {
            booking_id: booking.id(),
            label: booking.display_name().to_string(),
        },
        None => SeatState::Free,
    }
}

/// Verify that no two bookings claim the same (vehicle, seat) pair.
pub fn check_invariants(bookings: &[Booking]) -> OrganizerResult<()> {
    let mut seen: HashMap<(i64, &str), i64> = HashMap::new();
    for booking in bookings {
        if let Some(SeatAssignment {
            vehicle_id,
            seat_number,
        }) = &booking.core().seat
        {
            if let Some(previous) =
                seen.insert((*vehicle_id, seat_number.as_str()), booking.id())
            {
                return Err(OrganizerError::Conflict(format!(
                    "seat {} on vehicle {} claimed by bookings {} and {}",
                    seat_number,
                    vehicle_id,
                    previous,
                    booking.id()
                )));
            }
        }
    }
    Ok(())
}

/// Binds and unbinds bookings to vehicle seats, enforcing one passenger per
/// seat and one seat per passenger.
pub struct SeatingService<S> {
    store: Arc<S>,
}

impl<S: BookingStore> SeatingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// FREE → OCCUPIED. Fails when the booking already holds a different
    /// seat, or when the seat belongs to someone else; binding the seat the
    /// booking already holds is a no-op.
    pub async fn bind(
        &self,
        trip_id: i64,
        booking_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<()> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        let booking = find(&snapshot, booking_id)?;

        if let Some(current) = &booking.core().seat {
            if current.vehicle_id == vehicle_id && current.seat_number == seat_number {
                return Ok(());
            }
            return Err(OrganizerError::Validation(format!(
                "booking {} already holds seat {} on vehicle {}; unbind it first",
                booking_id, current.seat_number, current.vehicle_id
            )));
        }

        if let Some(occupant) = occupant_of(&snapshot, vehicle_id, seat_number) {
            return Err(OrganizerError::Conflict(format!(
                "seat {} on vehicle {} is occupied by booking {}",
                seat_number,
                vehicle_id,
                occupant.id()
            )));
        }

        self.store.bind_seat(booking_id, vehicle_id, seat_number).await?;
        info!(trip_id, booking_id, vehicle_id, seat_number, "seat bound");
        Ok(())
    }

    /// OCCUPIED → FREE. Clears seat and vehicle together; idempotent for an
    /// unseated booking.
    pub async fn unbind(&self, trip_id: i64, booking_id: i64) -> OrganizerResult<()> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        let booking = find(&snapshot, booking_id)?;

        if booking.core().seat.is_none() {
            return Ok(());
        }

        self.store.unbind_seat(booking_id).await?;
        info!(trip_id, booking_id, "seat unbound");
        Ok(())
    }

    /// Read-only look at one seat. Selecting an occupied seat never changes
    /// state; it only reveals the occupant.
    pub async fn inspect(
        &self,
        trip_id: i64,
        vehicle_id: i64,
        seat_number: &str,
    ) -> OrganizerResult<SeatState> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        Ok(slot_state(occupant_of(&snapshot, vehicle_id, seat_number)))
    }
}

fn find(snapshot: &[Booking], booking_id: i64) -> OrganizerResult<&Booking> {
    snapshot
        .iter()
        .find(|b| b.id() == booking_id)
        .ok_or_else(|| OrganizerError::NotFound(format!("booking {} not on trip", booking_id)))
}

fn occupant_of<'a>(
    snapshot: &'a [Booking],
    vehicle_id: i64,
    seat_number: &str,
) -> Option<&'a Booking> {
    snapshot.iter().find(|b| {
        b.core()
            .seat
            .as_ref()
            .map(|s| s.vehicle_id == vehicle_id && s.seat_number == seat_number)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{passenger, TRIP};
    use embarque_store::MemoryStore;

    fn bus(id: i64) -> Vehicle {
        Vehicle {
            id,
            name: format!("Bus {}", id),
            plate: "ABC1D23".to_string(),
            seat_numbers: (1..=4).map(|n| n.to_string()).collect(),
        }
    }

    async fn seeded(bookings: Vec<Booking>) -> (Arc<MemoryStore>, SeatingService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_trip(TRIP, bookings, vec![bus(1)], vec![]).await;
        let service = SeatingService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_bind_free_seat() {
        let (store, seating) = seeded(vec![passenger(7, 0, "Ana")]).await;

        seating.bind(TRIP, 7, 1, "12").await.unwrap();

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(
            bookings[0].core().seat,
            Some(SeatAssignment {
                vehicle_id: 1,
                seat_number: "12".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_bind_occupied_seat_conflicts_and_changes_nothing() {
        let (store, seating) = seeded(vec![passenger(9, 0, "Ana"), passenger(7, 1, "Bruno")]).await;
        seating.bind(TRIP, 9, 1, "12").await.unwrap();

        let err = seating.bind(TRIP, 7, 1, "12").await.unwrap_err();
        assert!(matches!(err, OrganizerError::Conflict(_)));

        let bookings = store.list_bookings(TRIP).await.unwrap();
        let by_id = |id: i64| bookings.iter().find(|b| b.id() == id).unwrap();
        assert_eq!(by_id(9).core().seat.as_ref().unwrap().seat_number, "12");
        assert!(by_id(7).core().seat.is_none());
    }

    #[tokio::test]
    async fn test_bind_while_holding_another_seat_requires_unbind() {
        let (_, seating) = seeded(vec![passenger(7, 0, "Ana")]).await;
        seating.bind(TRIP, 7, 1, "3").await.unwrap();

        let err = seating.bind(TRIP, 7, 1, "4").await.unwrap_err();
        assert!(matches!(err, OrganizerError::Validation(_)));

        // Rebinding the held seat is a no-op, not an error.
        seating.bind(TRIP, 7, 1, "3").await.unwrap();
    }

    #[tokio::test]
    async fn test_unbind_clears_seat_and_vehicle_together() {
        let (store, seating) = seeded(vec![passenger(7, 0, "Ana")]).await;
        seating.bind(TRIP, 7, 1, "2").await.unwrap();

        seating.unbind(TRIP, 7).await.unwrap();
        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert!(bookings[0].core().seat.is_none());

        // Idempotent.
        seating.unbind(TRIP, 7).await.unwrap();
    }

    #[tokio::test]
    async fn test_inspect_reveals_occupant_without_transition() {
        let (store, seating) = seeded(vec![passenger(7, 0, "Ana")]).await;
        seating.bind(TRIP, 7, 1, "2").await.unwrap();

        let state = seating.inspect(TRIP, 1, "2").await.unwrap();
        assert_eq!(
            state,
            SeatState::Occupied {
                booking_id: 7,
                label: "Ana".to_string(),
            }
        );
        assert_eq!(seating.inspect(TRIP, 1, "3").await.unwrap(), SeatState::Free);

        // Still occupied by the same booking.
        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert!(bookings[0].core().seat.is_some());
    }

    #[tokio::test]
    async fn test_seat_map_reports_layout_and_strays() {
        let (store, seating) = seeded(vec![passenger(1, 0, "Ana"), passenger(2, 1, "Bruno")]).await;
        seating.bind(TRIP, 1, 1, "2").await.unwrap();

        // Booking 2 references a seat outside the four-seat layout.
        store.bind_seat(2, 1, "99").await.unwrap();

        let bookings = store.list_bookings(TRIP).await.unwrap();
        let map = build_seat_map(&bus(1), &bookings);

        assert_eq!(map.seats.len(), 5);
        assert_eq!(map.occupied_count(), 2);
        let stray = map.seats.last().unwrap();
        assert_eq!(stray.seat_number, "99");
        assert!(!stray.in_layout);
    }

    #[tokio::test]
    async fn test_invariant_check_reports_duplicates() {
        let mut a = passenger(1, 0, "Ana");
        let mut b = passenger(2, 1, "Bruno");
        a.core_mut().seat = Some(SeatAssignment {
            vehicle_id: 1,
            seat_number: "5".to_string(),
        });
        b.core_mut().seat = Some(SeatAssignment {
            vehicle_id: 1,
            seat_number: "5".to_string(),
        });

        let err = check_invariants(&[a.clone(), b]).unwrap_err();
        assert!(matches!(err, OrganizerError::Conflict(_)));

        assert!(check_invariants(&[a]).is_ok());
    }
}

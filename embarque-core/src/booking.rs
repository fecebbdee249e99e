use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pickup or delivery side of a booking's ground transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Pickup,
    Delivery,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Pickup => write!(f, "pickup"),
            Leg::Delivery => write!(f, "delivery"),
        }
    }
}

/// Reference to a driver or broker record managed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub reference: Option<String>,
}

/// Seat and vehicle are bound together; a booking is either fully seated
/// or not seated at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatAssignment {
    pub vehicle_id: i64,
    pub seat_number: String,
}

/// Fields shared by passenger and parcel bookings. Everything the grouping,
/// ordering, linking, seating and dispatch engines operate on lives here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingCore {
    pub id: i64,
    pub trip_id: i64,
    pub pickup: Option<Address>,
    pub delivery: Option<Address>,
    pub collector_driver: Option<PartyRef>,
    pub deliverer_driver: Option<PartyRef>,
    pub broker: Option<PartyRef>,
    pub amount_cents: i64,
    pub paid: bool,
    /// Canonical per-trip sequence, dense 0..n-1.
    pub order_index: i64,
    /// View-local order for the city grouping. None until the city view is
    /// first reordered; sorting falls back to `order_index`.
    pub city_order_index: Option<i64>,
    /// Linked-group identifier. Singleton groups are None, never a group
    /// of one.
    pub group_id: Option<Uuid>,
    pub tag_color: Option<String>,
    pub seat: Option<SeatAssignment>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerBooking {
    pub core: BookingCore,
    pub passenger_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParcelBooking {
    pub core: BookingCore,
    pub sender_name: String,
    pub recipient_name: String,
    pub description: Option<String>,
}

/// One passenger-on-trip or parcel-on-trip record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Booking {
    Passenger(PassengerBooking),
    Parcel(ParcelBooking),
}

impl Booking {
    pub fn core(&self) -> &BookingCore {
        match self {
            Booking::Passenger(p) => &p.core,
            Booking::Parcel(p) => &p.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut BookingCore {
        match self {
            Booking::Passenger(p) => &mut p.core,
            Booking::Parcel(p) => &mut p.core,
        }
    }

    pub fn id(&self) -> i64 {
        self.core().id
    }

    pub fn trip_id(&self) -> i64 {
        self.core().trip_id
    }

    pub fn group_id(&self) -> Option<Uuid> {
        self.core().group_id
    }

    pub fn order_index(&self) -> i64 {
        self.core().order_index
    }

    pub fn is_passenger(&self) -> bool {
        matches!(self, Booking::Passenger(_))
    }

    /// Name shown on the manifest line.
    pub fn display_name(&self) -> &str {
        match self {
            Booking::Passenger(p) => &p.passenger_name,
            Booking::Parcel(p) => &p.recipient_name,
        }
    }

    pub fn address_for(&self, leg: Leg) -> Option<&Address> {
        match leg {
            Leg::Pickup => self.core().pickup.as_ref(),
            Leg::Delivery => self.core().delivery.as_ref(),
        }
    }

    pub fn driver_for(&self, leg: Leg) -> Option<&PartyRef> {
        match leg {
            Leg::Pickup => self.core().collector_driver.as_ref(),
            Leg::Delivery => self.core().deliverer_driver.as_ref(),
        }
    }
}

/// Vehicle roster entry; the seat map is derived from `seat_numbers` plus
/// the bookings currently bound to the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub name: String,
    pub plate: String,
    pub seat_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuggageItem {
    pub id: i64,
    pub booking_id: i64,
    pub description: String,
    pub quantity: u32,
}

/// Per-booking luggage rollup consumed by rendering.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LuggageSummary {
    pub pieces: u32,
    pub summary: String,
}

impl LuggageSummary {
    pub fn from_items(items: &[LuggageItem]) -> Self {
        let pieces = items.iter().map(|i| i.quantity).sum();
        let summary = items
            .iter()
            .map(|i| {
                if i.quantity > 1 {
                    format!("{}x {}", i.quantity, i.description)
                } else {
                    i.description.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self { pieces, summary }
    }

    pub fn is_empty(&self) -> bool {
        self.pieces == 0
    }
}

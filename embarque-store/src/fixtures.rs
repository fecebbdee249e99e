use chrono::Utc;
use uuid::Uuid;

use embarque_core::booking::{
    Address, Booking, BookingCore, LuggageItem, ParcelBooking, PartyRef, PassengerBooking, Vehicle,
};

use crate::MemoryStore;

pub const DEMO_TRIP_ID: i64 = 1;

fn address(city: &str, neighborhood: &str) -> Address {
    Address {
        street: None,
        number: None,
        city: Some(city.to_string()),
        neighborhood: Some(neighborhood.to_string()),
        reference: None,
    }
}

fn core(id: i64, order: i64, pickup: Address) -> BookingCore {
    BookingCore {
        id,
        trip_id: DEMO_TRIP_ID,
        pickup: Some(pickup),
        delivery: Some(address("Salvador", "")),
        collector_driver: None,
        deliverer_driver: None,
        broker: None,
        amount_cents: 18_000,
        paid: false,
        order_index: order,
        city_order_index: None,
        group_id: None,
        tag_color: None,
        seat: None,
        updated_at: Utc::now(),
    }
}

fn passenger(id: i64, order: i64, name: &str, pickup: Address) -> Booking {
    Booking::Passenger(PassengerBooking {
        core: core(id, order, pickup),
        passenger_name: name.to_string(),
        phone: None,
    })
}

fn parcel(id: i64, order: i64, sender: &str, recipient: &str, pickup: Address) -> Booking {
    Booking::Parcel(ParcelBooking {
        core: core(id, order, pickup),
        sender_name: sender.to_string(),
        recipient_name: recipient.to_string(),
        description: Some("caixa lacrada".to_string()),
    })
}

/// One realistic trip: a linked family, loose passengers across two cities,
/// a parcel, a two-vehicle fleet and some luggage.
pub async fn seed_demo(store: &MemoryStore) {
    let family = Uuid::new_v4();

    let mut mother = passenger(101, 0, "Maria Souza", address("Salvador", "Centro"));
    let mut son = passenger(102, 1, "Pedro Souza", address("Salvador", "Centro"));
    mother.core_mut().group_id = Some(family);
    son.core_mut().group_id = Some(family);
    mother.core_mut().tag_color = Some("#4caf50".to_string());
    son.core_mut().tag_color = Some("#4caf50".to_string());

    let bookings = vec![
        mother,
        son,
        passenger(103, 2, "João Lima", address("Salvador", "")),
        passenger(104, 3, "Ana Castro", address("Feira de Santana", "Kalilândia")),
        parcel(105, 4, "Carlos Dias", "Beatriz Dias", address("Feira de Santana", "")),
    ];

    let vehicles = vec![
        Vehicle {
            id: 1,
            name: "Van 1".to_string(),
            plate: "BRA2E19".to_string(),
            seat_numbers: (1..=15).map(|n| n.to_string()).collect(),
        },
        Vehicle {
            id: 2,
            name: "Van 2".to_string(),
            plate: "BRA9F31".to_string(),
            seat_numbers: (1..=15).map(|n| n.to_string()).collect(),
        },
    ];

    let luggage = vec![
        LuggageItem {
            id: 1,
            booking_id: 101,
            description: "mala grande".to_string(),
            quantity: 2,
        },
        LuggageItem {
            id: 2,
            booking_id: 104,
            description: "mochila".to_string(),
            quantity: 1,
        },
    ];

    store
        .seed_trip(DEMO_TRIP_ID, bookings, vehicles, luggage)
        .await;
    store
        .seed_drivers(vec![
            PartyRef {
                id: 5,
                name: "Zeca Prado".to_string(),
            },
            PartyRef {
                id: 6,
                name: "Abel Santana".to_string(),
            },
        ])
        .await;
}

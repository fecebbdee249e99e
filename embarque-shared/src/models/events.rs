use uuid::Uuid;

/// Broadcast after every organizer mutation so open screens (trip detail,
/// print view, seat picker) can refresh without polling.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ManifestEvent {
    pub trip_id: i64,
    pub kind: ManifestEventKind,
    pub occurred_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestEventKind {
    OrderChanged {
        scope: String,
    },
    GroupLinked {
        booking_id: i64,
        anchor_id: i64,
        group_id: Uuid,
    },
    GroupUnlinked {
        booking_id: i64,
    },
    TagChanged {
        booking_ids: Vec<i64>,
        color: Option<String>,
    },
    SeatBound {
        booking_id: i64,
        vehicle_id: i64,
        seat_number: String,
    },
    SeatUnbound {
        booking_id: i64,
    },
    DriversAssigned {
        booking_ids: Vec<i64>,
        driver_id: Option<i64>,
        leg: String,
    },
    MutationFailed {
        operation: String,
        message: String,
    },
}

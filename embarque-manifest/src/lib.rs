pub mod dispatch;
pub mod hierarchy;
pub mod linking;
pub mod ordering;
pub mod organizer;
pub mod seating;

pub use dispatch::{DispatchService, Selection};
pub use hierarchy::{
    build_hierarchy, Bucket, CityGroupBy, Hierarchy, LinkedGroup, ManifestEntry, OrganizeMode,
    SubBucket,
};
pub use linking::LinkingService;
pub use ordering::{OrderingService, ReorderScope};
pub use organizer::ManifestOrganizer;
pub use seating::{SeatMap, SeatSlot, SeatState, SeatingService};

#[cfg(test)]
pub(crate) mod testutil;

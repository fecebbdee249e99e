pub mod models;

pub use models::events::{ManifestEvent, ManifestEventKind};

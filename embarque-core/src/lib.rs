pub mod booking;
pub mod palette;
pub mod store;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OrganizerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type OrganizerResult<T> = Result<T, OrganizerError>;

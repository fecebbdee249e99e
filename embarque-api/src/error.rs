use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use embarque_core::OrganizerError;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Conflict(String),
    NotFound(String),
    Transport(String),
    Internal(anyhow::Error),
}

impl From<OrganizerError> for AppError {
    fn from(err: OrganizerError) -> Self {
        match err {
            OrganizerError::Validation(msg) => AppError::Validation(msg),
            OrganizerError::Conflict(msg) => AppError::Conflict(msg),
            OrganizerError::NotFound(msg) => AppError::NotFound(msg),
            OrganizerError::Transport(msg) => AppError::Transport(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Transport(msg) => {
                tracing::error!("Booking store unreachable: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

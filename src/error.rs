use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An authentication error (missing or invalid token / API key).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A resource not found error.
    #[error("{0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A start was attempted while the device already has an active session.
    #[error("{0}")]
    Conflict(String),

    /// An operation that requires an active session found none.
    #[error("{0}")]
    InvalidState(String),

    /// The device transport failed every retry attempt.
    #[error("Failed to send settings after {0} attempts")]
    TransportExhausted(u32),

    /// A network error from the HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::Unauthorized(ref msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::InvalidState(ref msg) => {
                tracing::debug!("Invalid state: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::TransportExhausted(attempts) => {
                tracing::error!("Device transport exhausted after {} attempts", attempts);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("Failed to send settings after {} attempts", attempts),
                )
            }

            AppError::Network(ref e) => {
                tracing::error!("Network error: {}", e);
                (StatusCode::BAD_GATEWAY, "Network error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "message": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"message":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}

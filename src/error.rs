//! Error types for Karmafeed
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required or bad credentials (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness conflict, e.g. duplicate username (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string(), "forbidden"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "conflict"),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "encryption")
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[error_type, "unknown"])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

//! Error handling
//!
//! Request-facing error taxonomy. Validation and not-initialized errors
//! carry a distinguishing status to the caller; cache and history failures
//! are absorbed in the decision path and never reach this type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    TokenExpired,
    TokenInvalid,
    Unauthorized,

    // Malformed or out-of-range input; never retried, never an incident
    ValidationError(String),

    // Classifier or preprocessor missing at request time
    NotInitialized,

    // Resource errors
    NotFound(String),

    // Database errors
    DatabaseError(String),

    // Cache backend failure surfaced by the explicit cache endpoints only
    CacheError(String),

    // Generic errors
    InternalError(String),
}

// Batch processing reports per-record failures as plain strings.
impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::TokenExpired => write!(f, "Token has expired"),
            AppError::TokenInvalid => write!(f, "Invalid token"),
            AppError::Unauthorized => write!(f, "Authentication required"),
            AppError::NotInitialized => write!(f, "Model or preprocessor not initialized"),
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::DatabaseError(msg)
            | AppError::CacheError(msg)
            | AppError::InternalError(msg) => write!(f, "{msg}"),
        }
    }
}

// Callers behind anyhow boundaries (the history recorder) rely on this.
impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
            AppError::TokenInvalid => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotInitialized => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Model or preprocessor not initialized",
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::CacheError(msg) => {
                tracing::error!("Cache error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache operation failed")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenInvalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagates_through_anyhow_boundary() {
        fn record() -> anyhow::Result<()> {
            Err(AppError::NotInitialized)?;
            Ok(())
        }
        let err = record().unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[test]
    fn display_carries_the_inner_message() {
        let err = AppError::ValidationError("serror_rate must be between 0 and 1".to_string());
        assert_eq!(err.to_string(), "serror_rate must be between 0 and 1");
    }
}

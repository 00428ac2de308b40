//! Error types for web handlers.
//!
//! [`AppError`] bridges lock errors and HTTP responses, implementing Axum's
//! `IntoResponse` trait.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seatlock_core::LockError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application error type for web handlers.
///
/// Carries the HTTP status, a machine-readable code and a user-facing
/// message. The optional source is logged for server errors and never sent to
/// the client.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error, logged for 5xx responses.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message.into(), "FORBIDDEN")
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR",
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (for client error handling).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Map lock errors onto HTTP statuses.
///
/// A lock conflict is not an error and never reaches this conversion.
impl From<LockError> for AppError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::SeatNotFound(seat_id) => Self::not_found("Seat", seat_id),
            forbidden @ LockError::Forbidden { .. } => Self::forbidden(forbidden.to_string()),
            LockError::InvalidTtl(ttl) => {
                Self::validation(format!("TTL of {}s is out of range", ttl.num_seconds()))
            }
            LockError::Store(source) => Self::unavailable("Lock store is unavailable")
                .with_source(anyhow::Error::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatlock_core::{HolderId, SeatId, StoreError};

    #[test]
    fn test_error_display() {
        let err = AppError::validation("Invalid input");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Invalid input");
    }

    #[test]
    fn test_lock_errors_map_to_statuses() {
        let seat_id = SeatId::new();

        let not_found = AppError::from(LockError::SeatNotFound(seat_id));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let forbidden = AppError::from(LockError::Forbidden {
            seat_id,
            holder_id: HolderId::new("bob"),
        });
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.code(), "FORBIDDEN");

        let invalid = AppError::from(LockError::InvalidTtl(chrono::Duration::zero()));
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let store = AppError::from(LockError::Store(StoreError::Connection("down".into())));
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(std::error::Error::source(&store).is_some());
    }
}

//! HTTP error responses.
//!
//! Bridges the core error taxonomy onto status codes and a JSON
//! `{code, message}` body. Internal detail is logged, never leaked to the
//! caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sorteo_core::CoreError;
use std::fmt;

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONFLICT".to_string())
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error with a generic message; the real
    /// cause goes to the log through `source`.
    #[must_use]
    pub fn internal(source: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            code: "INTERNAL_SERVER_ERROR".to_string(),
            source: Some(source),
        }
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Maps the core taxonomy onto HTTP statuses.
///
/// Webhook handlers override the `Validation` arm to plain 400; providers
/// expect 4xx on malformed payloads but understand nothing finer.
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(message) => Self::validation(message),
            CoreError::InventoryConflict(tickets) => Self::conflict(format!(
                "tickets no longer available: {tickets}; please re-select"
            )),
            CoreError::Authenticity { .. } => {
                // Reason stays in the log; callers failing verification get
                // no oracle.
                tracing::warn!(error = %err, "webhook authenticity failure");
                Self::unauthorized("signature verification failed")
            }
            CoreError::NotFound { .. } => Self::not_found(err.to_string()),
            CoreError::Transient(message) => {
                tracing::error!(error = %message, "transient dependency failure");
                Self::unavailable("temporarily unable to process the request; retry later")
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorteo_core::types::PaymentProvider;

    #[test]
    fn core_errors_map_to_expected_statuses() {
        let cases: Vec<(CoreError, StatusCode)> = vec![
            (
                CoreError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CoreError::InventoryConflict("3".into()), StatusCode::CONFLICT),
            (
                CoreError::Authenticity {
                    provider: PaymentProvider::CryptoPay,
                    reason: "mismatch".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                CoreError::NotFound {
                    resource: "order",
                    id: "1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::Transient("db".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[test]
    fn authenticity_message_leaks_no_detail() {
        let err = AppError::from(CoreError::Authenticity {
            provider: PaymentProvider::CashVoucher,
            reason: "secret-dependent detail".into(),
        });
        assert!(!err.message.contains("detail"));
    }
}

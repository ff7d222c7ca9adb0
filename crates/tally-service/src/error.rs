//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
///
/// Business outcomes (insufficient funds, invalid code, already subscribed)
/// are carried as dedicated variants so they serialize with stable codes;
/// only `Internal` represents a genuine fault.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but the action is not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits; a normal billing outcome, not a fault.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Total available at the time of the check.
        available: i64,
        /// Required amount.
        required: i64,
    },

    /// Unknown or already-consumed top-up code. Deliberately generic.
    #[error("invalid or expired code")]
    InvalidCode,

    /// The backing store cannot serve the request right now; operators
    /// should look, users should retry later.
    #[error("service not ready: {0}")]
    NotReady(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits {
                available,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                "Insufficient credits. Upgrade your plan or wait for the next reset.".to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "required": required
                })),
            ),
            Self::InvalidCode => (
                StatusCode::BAD_REQUEST,
                "invalid_code",
                "Invalid or expired code".to_string(),
                None,
            ),
            Self::NotReady(msg) => {
                tracing::error!(error = %msg, "Service not ready");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "not_ready",
                    "System update required. Please contact support.".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<tally_store::StoreError> for ApiError {
    fn from(err: tally_store::StoreError) -> Self {
        match err {
            tally_store::StoreError::NotFound => Self::NotFound("record not found".into()),
            tally_store::StoreError::InvalidAmount(amount) => {
                Self::BadRequest(format!("invalid amount: {amount}"))
            }
            tally_store::StoreError::Database(msg)
            | tally_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type for the service. Errors local to
//! one connection never reach the hub loop; this type surfaces at the
//! channel API and at the HTTP registration entry point.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid display name: must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-level error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category     | HTTP Status                 |
/// |-----------|--------------|-----------------------------|
/// | 1000-1999 | Validation   | 400 Bad Request             |
/// | 2000-2999 | Availability | 503 Service Unavailable     |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub control loop has shut down; the request was not processed.
    #[error("hub is shut down")]
    HubClosed,

    /// The requested display name is unusable.
    #[error("invalid display name: {0}")]
    InvalidName(String),

    /// The HTTP request could not be upgraded to a streaming connection.
    #[error("connection upgrade failed: {0}")]
    UpgradeFailed(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidName(_) => 1001,
            Self::UpgradeFailed(_) => 1002,
            Self::HubClosed => 2001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) | Self::UpgradeFailed(_) => StatusCode::BAD_REQUEST,
            Self::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

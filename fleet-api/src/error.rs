//! Error Types for FLEET API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_core::{FleetError, ResolutionError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Resource kind is not known in the selected scope
    UnknownKind,

    // ========================================================================
    // Upstream Errors (502, 503, 504)
    // ========================================================================
    /// The cluster fetch behind this request failed
    UpstreamError,

    /// Authorization backend could not answer
    AuthorizationUnavailable,

    /// Operation was cancelled before it completed
    Cancelled,

    /// Operation timed out
    Timeout,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,

            ErrorCode::UnknownKind => StatusCode::NOT_FOUND,

            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,

            ErrorCode::AuthorizationUnavailable | ErrorCode::Cancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::UnknownKind => "Unknown resource kind",
            ErrorCode::UpstreamError => "Cluster request failed",
            ErrorCode::AuthorizationUnavailable => "Authorization backend unavailable",
            ErrorCode::Cancelled => "Operation cancelled",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        let code = match &err {
            FleetError::Validation(ValidationError::RequiredFieldMissing { .. }) => {
                ErrorCode::MissingField
            }
            FleetError::Validation(ValidationError::InvalidValue { .. }) => ErrorCode::InvalidInput,
            FleetError::Resolution(ResolutionError::UnknownKind { .. }) => ErrorCode::UnknownKind,
            FleetError::Resolution(ResolutionError::DiscoveryFailed { .. })
            | FleetError::Fetch { .. } => ErrorCode::UpstreamError,
            FleetError::Authorization(_) => ErrorCode::AuthorizationUnavailable,
            FleetError::Cancelled => ErrorCode::Cancelled,
            FleetError::DeadlineExceeded => ErrorCode::Timeout,
            FleetError::Config(_) | FleetError::Serialization { .. } => {
                tracing::error!(error = %err, "internal error");
                ErrorCode::InternalError
            }
        };
        Self::new(code, err.to_string())
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::AuthorizationError;
    use std::time::Duration;

    #[test]
    fn test_validation_codes_are_bad_request() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_fleet_error_mapping() {
        let cases = [
            (
                FleetError::Validation(ValidationError::RequiredFieldMissing {
                    field: "scope".to_string(),
                }),
                ErrorCode::MissingField,
            ),
            (
                FleetError::Resolution(ResolutionError::UnknownKind {
                    kind: "Gizmo".to_string(),
                }),
                ErrorCode::UnknownKind,
            ),
            (FleetError::fetch("connection refused"), ErrorCode::UpstreamError),
            (
                FleetError::Authorization(AuthorizationError::Timeout {
                    after: Duration::from_secs(2),
                }),
                ErrorCode::AuthorizationUnavailable,
            ),
            (FleetError::Cancelled, ErrorCode::Cancelled),
            (FleetError::DeadlineExceeded, ErrorCode::Timeout),
        ];

        for (err, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_error_serializes_screaming_snake_code() {
        let body = serde_json::to_value(ApiError::missing_field("scope")).unwrap();
        assert_eq!(body["code"], "MISSING_FIELD");
        assert!(body.get("details").is_none());
    }
}

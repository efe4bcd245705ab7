//! Error types for FLEET operations

use std::time::Duration;
use thiserror::Error;

/// Malformed input, reported per item and never fatal to a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Resource kind could not be mapped to an API identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unknown resource kind: {kind}")]
    UnknownKind { kind: String },

    #[error("Discovery failed for {kind}: {reason}")]
    DiscoveryFailed { kind: String, reason: String },
}

/// The authorization backend could not produce a decision.
///
/// This is deliberately separate from a well-formed deny, which is a
/// [`PermissionDecision`](crate::PermissionDecision) with `allowed == false`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Authorization check failed: {reason}")]
    CheckFailed { reason: String },

    #[error("Authorization check timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Authorization client unavailable: {reason}")]
    ClientUnavailable { reason: String },

    #[error("Authorization backend returned no result for item {index}")]
    MissingResult { index: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all FLEET errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed: {reason}")]
    Fetch { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl FleetError {
    /// Build a fetch error from anything displayable.
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch {
            reason: reason.into(),
        }
    }

    /// True for both cancellation-kind variants.
    ///
    /// Whether a cancellation is silent (supersession) or surfaced (caller
    /// deadline, parent cancellation) is decided by the coordinator that
    /// owns the operation, not here.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Result type alias for FLEET operations.
pub type FleetResult<T> = Result<T, FleetError>;

// =============================================================================
// TESTS
// =============================================================================

//! Scope keys.
//!
//! A scope is an isolation boundary, typically one selected cluster context
//! or kubeconfig identity. Operations and cached responses are partitioned by
//! scope and never combined across partitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FleetResult, ValidationError};

/// Opaque identifier for a logical execution domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Wrap a raw scope string without validation.
    ///
    /// Use [`ScopeKey::parse`] for anything that arrives from a request.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse a scope from untrusted input, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> FleetResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "scope".to_string(),
            }
            .into());
        }
        if trimmed.chars().any(char::is_control) {
            return Err(ValidationError::InvalidValue {
                field: "scope".to_string(),
                reason: "must not contain control characters".to_string(),
            }
            .into());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScopeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FleetError;

    #[test]
    fn test_parse_trims() {
        let scope = ScopeKey::parse("  prod-eu-1 ").unwrap();
        assert_eq!(scope.as_str(), "prod-eu-1");
        assert_eq!(scope.to_string(), "prod-eu-1");
    }

    #[test]
    fn test_parse_rejects_blank() {
        let err = ScopeKey::parse("   ").unwrap_err();
        assert!(matches!(
            err,
            FleetError::Validation(ValidationError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        assert!(ScopeKey::parse("kind\ncluster").is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let scope = ScopeKey::new("dev");
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"dev\"");
        let back: ScopeKey = serde_json::from_str("\"dev\"").unwrap();
        assert_eq!(back, scope);
    }
}

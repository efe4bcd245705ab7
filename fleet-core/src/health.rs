//! Scope health check types
//!
//! Probes of a cluster scope report through these types so that the API,
//! the selection flow, and background checks describe health the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scope::ScopeKey;

/// Health status for a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// API server reachable and credentials accepted
    Healthy,
    /// Reachable, but slow or partially failing
    Degraded,
    /// Not reachable or credentials rejected
    Unhealthy,
    /// Not yet probed
    Unknown,
}

/// Result of probing one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub scope: ScopeKey,
    pub message: Option<String>,
    /// Probe round trip in milliseconds (if measured)
    pub response_time_ms: Option<i64>,
    pub checked_at: DateTime<Utc>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    fn with_status(status: HealthStatus, scope: ScopeKey, message: Option<String>) -> Self {
        Self {
            status,
            scope,
            message,
            response_time_ms: None,
            checked_at: Utc::now(),
            metadata: None,
        }
    }

    pub fn healthy(scope: ScopeKey) -> Self {
        Self::with_status(HealthStatus::Healthy, scope, None)
    }

    pub fn degraded(scope: ScopeKey, message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, scope, Some(message.into()))
    }

    pub fn unhealthy(scope: ScopeKey, message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unhealthy, scope, Some(message.into()))
    }

    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

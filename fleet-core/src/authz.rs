//! Authorization data model: API identities, access attributes, permission
//! decisions, and capability check requests/results.

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult, ValidationError};

/// The verb used for every read-path check.
pub const READ_VERB: &str = "get";

/// The API identity a resource kind resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiIdentity {
    /// API group; empty for the core group.
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `deployments`.
    pub resource: String,
    pub namespaced: bool,
}

impl ApiIdentity {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
            namespaced,
        }
    }
}

/// The full attribute tuple of one authorization question.
///
/// Two checks with equal attributes are the same question; the batch
/// evaluator uses this type directly as its deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AccessAttributes {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub verb: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub subresource: Option<String>,
}

impl AccessAttributes {
    /// Read access to a single object of the given identity.
    pub fn read(identity: &ApiIdentity, namespace: Option<&str>, name: Option<&str>) -> Self {
        Self {
            group: identity.group.clone(),
            version: identity.version.clone(),
            resource: identity.resource.clone(),
            verb: READ_VERB.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.map(str::to_string),
            subresource: None,
        }
    }
}

/// A point-in-time authorization answer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PermissionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,
    /// Evaluation error reported by the authorizer alongside its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_error: Option<String>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            denied_reason: Some(reason.into()),
            evaluation_error: None,
        }
    }

    pub fn with_evaluation_error(mut self, error: impl Into<String>) -> Self {
        self.evaluation_error = Some(error.into());
        self
    }
}

/// One caller-supplied "can I do X" question.
///
/// `id` correlates the result back to the request; it is caller-chosen and
/// need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct CapabilityCheckRequest {
    pub id: String,
    pub verb: String,
    pub resource_kind: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub subresource: Option<String>,
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CapabilityCheckRequest {
    /// Trim every field, lower-case the verb, and collapse blank optionals.
    pub fn normalized(self) -> Self {
        Self {
            id: self.id.trim().to_string(),
            verb: self.verb.trim().to_lowercase(),
            resource_kind: self.resource_kind.trim().to_string(),
            namespace: normalize_optional(self.namespace),
            name: normalize_optional(self.name),
            subresource: normalize_optional(self.subresource),
        }
    }

    /// Check required fields. Expects a normalized request.
    pub fn validate(&self) -> FleetResult<()> {
        for (field, value) in [
            ("id", &self.id),
            ("verb", &self.verb),
            ("resourceKind", &self.resource_kind),
        ] {
            if value.is_empty() {
                return Err(FleetError::Validation(ValidationError::RequiredFieldMissing {
                    field: field.to_string(),
                }));
            }
        }
        Ok(())
    }
}

/// Answer to one [`CapabilityCheckRequest`], mirroring its fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CapabilityCheckResult {
    pub id: String,
    pub verb: String,
    pub resource_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subresource: Option<String>,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_error: Option<String>,
    /// Set when no decision could be produced for this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityCheckResult {
    /// An undecided result echoing the request.
    pub fn pending(request: &CapabilityCheckRequest) -> Self {
        Self {
            id: request.id.clone(),
            verb: request.verb.clone(),
            resource_kind: request.resource_kind.clone(),
            namespace: request.namespace.clone(),
            name: request.name.clone(),
            subresource: request.subresource.clone(),
            ..Default::default()
        }
    }

    pub fn fail(&mut self, error: &FleetError) {
        self.allowed = false;
        self.error = Some(error.to_string());
    }

    pub fn apply(&mut self, decision: &PermissionDecision) {
        self.allowed = decision.allowed;
        self.denied_reason = decision.denied_reason.clone();
        self.evaluation_error = decision.evaluation_error.clone();
        self.error = None;
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

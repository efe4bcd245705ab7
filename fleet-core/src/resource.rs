//! Object references and response representations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which representation of an object a response carries.
///
/// Detail and YAML responses for the same object are cached under separate
/// keys and must be evicted together when access is revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ResourceView {
    #[default]
    Detail,
    Yaml,
}

impl ResourceView {
    pub const ALL: [ResourceView; 2] = [ResourceView::Detail, ResourceView::Yaml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ResourceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named object within a scope: `(kind, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ObjectRef {
    pub kind: String,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            name: name.into(),
        }
    }

    /// Resource key under which one representation of this object is cached.
    ///
    /// Scope is not part of the key; the cache binds it separately.
    pub fn cache_key(&self, view: ResourceView) -> String {
        format!(
            "{}:{}:{}/{}",
            view,
            self.kind.to_ascii_lowercase(),
            self.namespace.as_deref().unwrap_or(""),
            self.name
        )
    }
}

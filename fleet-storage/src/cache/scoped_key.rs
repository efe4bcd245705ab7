//! Scope-bound cache keys.
//!
//! A `ScopedKey` can only be constructed from a [`ScopeKey`] plus a resource
//! key, so a lookup that forgets its scope does not compile.

use std::fmt;

use fleet_core::ScopeKey;

/// Separator between scope and resource key in the rendered form.
pub const SEPARATOR: char = '|';

/// A resource key bound to the scope it was fetched under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
    inner: ScopedKeyInner,
}

/// Private inner struct - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopedKeyInner {
    scope: ScopeKey,
    resource: String,
}

impl ScopedKey {
    pub fn new(scope: &ScopeKey, resource: impl Into<String>) -> Self {
        Self {
            inner: ScopedKeyInner {
                scope: scope.clone(),
                resource: resource.into(),
            },
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.inner.scope
    }

    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn belongs_to(&self, scope: &ScopeKey) -> bool {
        &self.inner.scope == scope
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.inner.scope, SEPARATOR, self.inner.resource)
    }
}

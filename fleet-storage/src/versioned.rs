//! Conditional responses keyed by content version.
//!
//! The fetch always runs; only the wire payload is suppressed when the
//! client already holds the current version.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fleet_core::{FleetResult, ScopeKey, VersionCheck, VersionStore};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::scoped_key::SEPARATOR;

/// Compute the version string of a payload (lowercase hex SHA-256).
pub fn content_version(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Version record key: `kind` or `kind:namespace`.
pub fn version_key(kind: &str, namespace: Option<&str>) -> String {
    match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{}:{}", kind, ns),
        None => kind.to_string(),
    }
}

/// Last computed version per key, held in memory.
///
/// Records are kept in update order. When `max_entries` is non-zero the
/// least recently updated record is dropped to make room. Dropping a record
/// never changes a response: `notModified` compares against the payload hash.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    versions: Mutex<IndexMap<String, String>>,
    max_entries: usize,
}

impl InMemoryVersionStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `max_entries` records (0 = unlimited).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            versions: Mutex::new(IndexMap::new()),
            max_entries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, String>> {
        self.versions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn version_for(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Drop the record for `key`. Returns whether one existed.
    pub fn forget(&self, key: &str) -> bool {
        self.lock().shift_remove(key).is_some()
    }

    /// Drop every record keyed under `scope` (keys rendered as
    /// [`ScopedKey`](crate::ScopedKey)s). Returns how many were removed.
    pub fn forget_scope(&self, scope: &ScopeKey) -> usize {
        let prefix = format!("{}{}", scope, SEPARATOR);
        let mut versions = self.lock();
        let before = versions.len();
        versions.retain(|key, _| !key.starts_with(&prefix));
        before - versions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VersionStore for InMemoryVersionStore {
    fn check_and_update(
        &self,
        key: &str,
        payload: &[u8],
        client_version: &str,
    ) -> FleetResult<VersionCheck> {
        let version = content_version(payload);
        let mut versions = self.lock();
        let previous = versions.shift_remove(key);
        if previous.as_deref().is_some_and(|p| p != version) {
            tracing::trace!(key, "content version changed");
        }
        if self.max_entries > 0 {
            while versions.len() >= self.max_entries {
                if versions.shift_remove_index(0).is_none() {
                    break;
                }
            }
        }
        versions.insert(key.to_string(), version.clone());
        drop(versions);

        Ok(VersionCheck {
            not_modified: !client_version.is_empty() && client_version == version,
            version,
        })
    }
}

/// Response body carrying a content version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedResponse<T> {
    /// Absent when the client already has this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub version: String,
    pub not_modified: bool,
}

/// Run `fetch` and version its result under `kind[:namespace]`.
///
/// A fetch error is returned unchanged and records no version.
pub async fn versioned<T, F, Fut>(
    store: &dyn VersionStore,
    kind: &str,
    namespace: Option<&str>,
    fetch: F,
    client_version: &str,
) -> FleetResult<VersionedResponse<T>>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = FleetResult<T>>,
{
    let data = fetch().await?;
    let payload = serde_json::to_vec(&data)?;
    let check = store.check_and_update(&version_key(kind, namespace), &payload, client_version)?;

    if check.not_modified {
        return Ok(VersionedResponse {
            data: None,
            version: check.version,
            not_modified: true,
        });
    }

    Ok(VersionedResponse {
        data: Some(data),
        version: check.version,
        not_modified: false,
    })
}

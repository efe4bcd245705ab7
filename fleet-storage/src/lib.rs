//! FLEET Storage - Response Caching and Versioning
//!
//! Cached cluster responses are partitioned by scope, bounded by TTL and
//! entry count, and re-authorized before a hit is trusted. Fetch results can
//! be wrapped with a content version so unchanged payloads are not resent.

pub mod cache;
pub mod versioned;

pub use cache::{
    CacheConfig, CacheStats, GuardDecision, PermissionGuard, ResponseCache, ScopedKey,
};
pub use versioned::{
    content_version, version_key, versioned, InMemoryVersionStore, VersionedResponse,
};

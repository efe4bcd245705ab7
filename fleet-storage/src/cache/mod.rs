//! Scope-partitioned response cache.
//!
//! Entries are stored under a [`ScopedKey`], which cannot be built without a
//! scope, so two clusters caching the same resource key never collide.
//! Reads enforce expiry themselves; the background sweeper only reclaims
//! memory.
//!
//! [`PermissionGuard`] sits in front of cache hits for object detail and YAML
//! responses. Only an explicit deny is acted on: the entries for both
//! representations are evicted and the hit is refused. Everything
//! inconclusive serves the cached response.

pub mod bounded;
pub mod guard;
pub mod scoped_key;
pub mod stats;

pub use bounded::{CacheConfig, ResponseCache};
pub use guard::{GuardDecision, PermissionGuard};
pub use scoped_key::ScopedKey;
pub use stats::CacheStats;

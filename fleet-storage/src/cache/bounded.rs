//! TTL and capacity bounded response cache.
//!
//! One flat keyspace of [`ScopedKey`]s kept in insertion order. Capacity
//! pressure evicts the oldest insertion; reads do not refresh position, so
//! callers must not rely on a recently read entry surviving eviction.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fleet_core::{CacheSettings, ScopeKey};
use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::scoped_key::ScopedKey;
use super::stats::CacheStats;

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of each entry, fixed at insertion.
    pub ttl: Duration,
    /// Maximum entry count; 0 means unlimited.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheSettings::default().into()
    }
}

impl From<CacheSettings> for CacheConfig {
    fn from(settings: CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            max_entries: settings.max_entries,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the max entry count (0 = unlimited).
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: IndexMap<ScopedKey, CacheEntry<V>>,
    stats: CacheStats,
}

/// In-memory response cache partitioned by scope.
#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: IndexMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key` under `scope`. An expired entry is removed and reported
    /// as absent.
    pub fn get(&self, scope: &ScopeKey, key: &str) -> Option<V> {
        let scoped = ScopedKey::new(scope, key);
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(&scoped) {
            Some(entry) if entry.expires_at > now => {
                let value = entry.value.clone();
                inner.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.shift_remove(&scoped);
            inner.stats.expirations += 1;
        }
        inner.stats.misses += 1;
        None
    }

    /// Store `value` under `scope`/`key` with a fresh expiry.
    ///
    /// Re-setting an existing key moves it to the newest position.
    pub fn set(&self, scope: &ScopeKey, key: impl Into<String>, value: V) {
        let scoped = ScopedKey::new(scope, key);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.config.ttl,
        };
        let mut inner = self.lock();

        inner.entries.shift_remove(&scoped);
        if self.config.max_entries > 0 {
            while inner.entries.len() >= self.config.max_entries {
                match inner.entries.shift_remove_index(0) {
                    Some((evicted, _)) => {
                        inner.stats.evictions += 1;
                        tracing::trace!(key = %evicted, "cache entry evicted");
                    }
                    None => break,
                }
            }
        }
        inner.entries.insert(scoped, entry);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn delete(&self, scope: &ScopeKey, key: &str) -> bool {
        let scoped = ScopedKey::new(scope, key);
        self.lock().entries.shift_remove(&scoped).is_some()
    }

    /// Drop every entry cached under `scope`. Returns how many were removed.
    pub fn invalidate_scope(&self, scope: &ScopeKey) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.belongs_to(scope));
        before - inner.entries.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - inner.entries.len();
        inner.stats.expirations += purged as u64;
        purged
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.entries.len() as u64,
            ..inner.stats
        }
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Periodically reclaim expired entries until `cancel` fires.
    ///
    /// Returns `None` when `interval` is zero.
    pub fn spawn_sweeper(
        cache: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "cache sweep reclaimed expired entries");
                        }
                    }
                }
            }
            tracing::debug!("cache sweeper stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(name: &str) -> ScopeKey {
        ScopeKey::new(name)
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> ResponseCache<String> {
        ResponseCache::new(
            CacheConfig::new()
                .with_ttl(Duration::from_secs(ttl_secs))
                .with_max_entries(max_entries),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl_then_expired() {
        let cache = cache(30, 0);
        cache.set(&scope("prod"), "pods", "v".to_string());

        assert_eq!(cache.get(&scope("prod"), "pods").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&scope("prod"), "pods"), None);
        // Expired entries are removed by the read itself.
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_one_evicts_first_key() {
        let cache = cache(30, 1);
        cache.set(&scope("prod"), "a", "1".to_string());
        cache.set(&scope("prod"), "b", "2".to_string());

        assert_eq!(cache.get(&scope("prod"), "a"), None);
        assert_eq!(cache.get(&scope("prod"), "b").as_deref(), Some("2"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_ignores_reads() {
        let cache = cache(30, 2);
        cache.set(&scope("prod"), "a", "1".to_string());
        cache.set(&scope("prod"), "b", "2".to_string());
        assert!(cache.get(&scope("prod"), "a").is_some());

        cache.set(&scope("prod"), "c", "3".to_string());
        assert_eq!(cache.get(&scope("prod"), "a"), None);
        assert!(cache.get(&scope("prod"), "b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_refreshes_position_and_expiry() {
        let cache = cache(30, 2);
        cache.set(&scope("prod"), "a", "1".to_string());
        cache.set(&scope("prod"), "b", "2".to_string());

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.set(&scope("prod"), "a", "1b".to_string());
        cache.set(&scope("prod"), "c", "3".to_string());

        assert_eq!(cache.get(&scope("prod"), "b"), None);
        assert_eq!(cache.get(&scope("prod"), "a").as_deref(), Some("1b"));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(cache.get(&scope("prod"), "a").as_deref(), Some("1b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_is_unlimited() {
        let cache = cache(30, 0);
        for i in 0..500 {
            cache.set(&scope("prod"), format!("k{}", i), i.to_string());
        }
        assert_eq!(cache.len(), 500);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scopes_do_not_collide() {
        let cache = cache(30, 0);
        cache.set(&scope("prod"), "pods", "prod-pods".to_string());
        cache.set(&scope("staging"), "pods", "staging-pods".to_string());

        assert_eq!(cache.get(&scope("prod"), "pods").as_deref(), Some("prod-pods"));
        assert_eq!(
            cache.get(&scope("staging"), "pods").as_deref(),
            Some("staging-pods")
        );

        assert!(cache.delete(&scope("prod"), "pods"));
        assert!(!cache.delete(&scope("prod"), "pods"));
        assert!(cache.get(&scope("staging"), "pods").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_scope_leaves_other_scopes() {
        let cache = cache(30, 0);
        cache.set(&scope("prod"), "a", "1".to_string());
        cache.set(&scope("prod"), "b", "2".to_string());
        cache.set(&scope("staging"), "a", "3".to_string());

        assert_eq!(cache.invalidate_scope(&scope("prod")), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&scope("staging"), "a").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_and_stats() {
        let cache = cache(10, 0);
        cache.set(&scope("prod"), "old", "1".to_string());
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set(&scope("prod"), "new", "2".to_string());
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get(&scope("prod"), "new").is_some());
        assert!(cache.get(&scope("prod"), "missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_and_stops_on_cancel() {
        let cache = Arc::new(cache(5, 0));
        cache.set(&scope("prod"), "a", "1".to_string());

        let cancel = CancellationToken::new();
        let handle =
            ResponseCache::spawn_sweeper(Arc::clone(&cache), Duration::from_secs(10), cancel.clone())
                .unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_sweeper_disabled_for_zero_interval() {
        let cache = Arc::new(cache(5, 0));
        let handle =
            ResponseCache::spawn_sweeper(cache, Duration::ZERO, CancellationToken::new());
        assert!(handle.is_none());
    }
}

//! Shared application state for Axum routers.

use std::sync::{Arc, PoisonError, RwLock};

use fleet_authz::CapabilityEvaluator;
use fleet_coord::{ScopeTokens, ScopedCoordinator, SelectionSequencer};
use fleet_core::{
    AccessReviewConnector, CheckerRegistry, FleetConfig, ResourceFetcher, ResourceResolver,
    ScopeKey, ScopeProbe,
};
use fleet_storage::{CacheConfig, InMemoryVersionStore, PermissionGuard, ResponseCache};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cached response bodies, keyed by scope and representation.
pub type ApiCache = ResponseCache<serde_json::Value>;

/// Cluster-facing implementations the state is assembled from.
#[derive(Clone)]
pub struct Collaborators {
    pub checkers: Arc<dyn CheckerRegistry>,
    pub resolver: Arc<dyn ResourceResolver>,
    pub reviews: Arc<dyn AccessReviewConnector>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub probe: Arc<dyn ScopeProbe>,
}

/// Snapshot of the published selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub scope: Option<ScopeKey>,
    pub generation: u64,
}

/// The selection that mutations publish into.
///
/// Publishing only moves forward: a generation older than the one already
/// published is ignored.
#[derive(Debug, Default)]
pub struct SelectionState {
    current: RwLock<Selection>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Selection {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish `scope` at `generation`.
    ///
    /// Returns `Ok(previous scope)` when published and `Err(())` when a newer
    /// generation is already in place.
    #[allow(clippy::result_unit_err)]
    pub fn publish(&self, scope: ScopeKey, generation: u64) -> Result<Option<ScopeKey>, ()> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if generation < current.generation {
            return Err(());
        }
        current.generation = generation;
        Ok(current.scope.replace(scope))
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FleetConfig>,
    pub coordinator: Arc<ScopedCoordinator>,
    pub sequencer: Arc<SelectionSequencer>,
    pub selection: Arc<SelectionState>,
    /// Response cache; the guard holds the same instance.
    pub cache: Arc<ApiCache>,
    pub guard: Arc<PermissionGuard<serde_json::Value>>,
    pub evaluator: Arc<CapabilityEvaluator>,
    /// Content versions; bounded like the cache.
    pub versions: Arc<InMemoryVersionStore>,
    /// Cancellation for reads bound to a scope; revoked on deselection.
    pub scopes: Arc<ScopeTokens>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub probe: Arc<dyn ScopeProbe>,
    /// Cancelled on shutdown; background tasks and request contexts derive
    /// from it.
    pub shutdown: CancellationToken,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: FleetConfig, collaborators: Collaborators) -> Self {
        let cache = Arc::new(ApiCache::new(CacheConfig::from(config.cache.clone())));
        let guard = PermissionGuard::new(
            Arc::clone(&cache),
            collaborators.checkers,
            Arc::clone(&collaborators.resolver),
            config.authz.check_timeout,
        );
        let evaluator = CapabilityEvaluator::new(
            collaborators.reviews,
            collaborators.resolver,
            config.authz.batch_timeout,
        );
        let shutdown = CancellationToken::new();
        let versions = InMemoryVersionStore::with_capacity(config.cache.max_entries);

        Self {
            config: Arc::new(config),
            coordinator: Arc::new(ScopedCoordinator::new()),
            sequencer: Arc::new(SelectionSequencer::new()),
            selection: Arc::new(SelectionState::new()),
            cache,
            guard: Arc::new(guard),
            evaluator: Arc::new(evaluator),
            versions: Arc::new(versions),
            scopes: Arc::new(ScopeTokens::new(shutdown.clone())),
            fetcher: collaborators.fetcher,
            probe: collaborators.probe,
            shutdown,
            start_time: std::time::Instant::now(),
        }
    }

    /// Start the cache sweeper. Must be called inside a tokio runtime.
    pub fn start_background_tasks(&self) -> Option<JoinHandle<()>> {
        ResponseCache::spawn_sweeper(
            Arc::clone(&self.cache),
            self.config.cache.sweep_interval,
            self.shutdown.child_token(),
        )
    }

    /// Unwind everything in flight.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let cancelled = self.coordinator.cancel_all();
        self.sequencer.shutdown();
        tracing::info!(cancelled, "application state shut down");
    }
}

crate::impl_from_ref!(Arc<CapabilityEvaluator>, evaluator);
crate::impl_from_ref!(CancellationToken, shutdown);

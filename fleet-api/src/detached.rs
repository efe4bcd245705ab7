//! Collaborators for running without a cluster client.
//!
//! Every cluster-bound call fails with a descriptive error: fetches and
//! probes report an upstream failure, capability checks report an
//! unavailable client, and the cache guard fails open because no checker is
//! registered. Host applications replace these with real implementations
//! through [`Collaborators`].

use std::sync::Arc;

use async_trait::async_trait;
use fleet_core::{
    AccessReviewClient, AccessReviewConnector, AuthorizationChecker, AuthorizationError,
    CheckerRegistry, FleetError, FleetResult, HealthCheck, ObjectRef, RequestContext,
    ResourceFetcher, ResourceView, ScopeKey, ScopeProbe,
};

use crate::kinds::CoreKindResolver;
use crate::state::Collaborators;

const DETACHED: &str = "no cluster client attached";

#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedCluster;

impl CheckerRegistry for DetachedCluster {
    fn checker_for(&self, _scope: &ScopeKey) -> Option<Arc<dyn AuthorizationChecker>> {
        None
    }
}

#[async_trait]
impl AccessReviewConnector for DetachedCluster {
    async fn connect(
        &self,
        _ctx: &RequestContext,
        scope: &ScopeKey,
    ) -> Result<Arc<dyn AccessReviewClient>, AuthorizationError> {
        Err(AuthorizationError::ClientUnavailable {
            reason: format!("{} for scope '{}'", DETACHED, scope),
        })
    }
}

#[async_trait]
impl ResourceFetcher for DetachedCluster {
    async fn fetch(
        &self,
        _ctx: &RequestContext,
        scope: &ScopeKey,
        object: &ObjectRef,
        _view: ResourceView,
    ) -> FleetResult<serde_json::Value> {
        Err(FleetError::fetch(format!(
            "{} for scope '{}'; cannot read {} '{}'",
            DETACHED, scope, object.kind, object.name
        )))
    }
}

#[async_trait]
impl ScopeProbe for DetachedCluster {
    async fn probe(&self, _ctx: &RequestContext, scope: &ScopeKey) -> FleetResult<HealthCheck> {
        Ok(HealthCheck::unhealthy(scope.clone(), DETACHED))
    }
}

impl Collaborators {
    /// Collaborators that answer without touching a cluster.
    pub fn detached() -> Self {
        let cluster = Arc::new(DetachedCluster);
        Self {
            checkers: cluster.clone(),
            resolver: Arc::new(CoreKindResolver),
            reviews: cluster.clone(),
            fetcher: cluster.clone(),
            probe: cluster,
        }
    }
}

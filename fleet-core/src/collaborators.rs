//! Collaborator traits.
//!
//! These are the narrow seams through which the coordination, cache, and
//! authorization layers reach cluster-specific code. Implementations live
//! with the host application (or in `fleet-test-utils` for tests).

use std::sync::Arc;

use async_trait::async_trait;

use crate::authz::{AccessAttributes, ApiIdentity, PermissionDecision};
use crate::context::RequestContext;
use crate::error::{AuthorizationError, FleetResult, ResolutionError};
use crate::health::HealthCheck;
use crate::resource::{ObjectRef, ResourceView};
use crate::scope::ScopeKey;

/// Answers a single authorization question for one scope.
#[async_trait]
pub trait AuthorizationChecker: Send + Sync {
    /// `Ok` carries a well-formed decision (allow or deny). `Err` means the
    /// backend could not decide; callers must not read it as a deny.
    async fn check(
        &self,
        ctx: &RequestContext,
        attributes: &AccessAttributes,
    ) -> Result<PermissionDecision, AuthorizationError>;
}

/// Looks up the authorization checker for a scope, if one is available.
pub trait CheckerRegistry: Send + Sync {
    fn checker_for(&self, scope: &ScopeKey) -> Option<Arc<dyn AuthorizationChecker>>;
}

/// Maps a resource kind to its API identity within a scope.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve(&self, scope: &ScopeKey, kind: &str) -> Result<ApiIdentity, ResolutionError>;
}

/// A connected client able to evaluate many authorization questions at once.
#[async_trait]
pub trait AccessReviewClient: Send + Sync {
    /// Evaluate `items` in one call. The outer `Err` fails the whole call;
    /// otherwise the returned vector is parallel to `items`.
    async fn review(
        &self,
        ctx: &RequestContext,
        items: &[AccessAttributes],
    ) -> Result<Vec<Result<PermissionDecision, AuthorizationError>>, AuthorizationError>;
}

/// Builds (or hands out an already built) access review client for a scope.
#[async_trait]
pub trait AccessReviewConnector: Send + Sync {
    async fn connect(
        &self,
        ctx: &RequestContext,
        scope: &ScopeKey,
    ) -> Result<Arc<dyn AccessReviewClient>, AuthorizationError>;
}

/// Outcome of comparing a payload's content version with the client's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub version: String,
    pub not_modified: bool,
}

/// Remembers the content version last computed for each cache key.
pub trait VersionStore: Send + Sync {
    fn check_and_update(
        &self,
        key: &str,
        payload: &[u8],
        client_version: &str,
    ) -> FleetResult<VersionCheck>;
}

/// Fetches one representation of one object from a cluster.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        scope: &ScopeKey,
        object: &ObjectRef,
        view: ResourceView,
    ) -> FleetResult<serde_json::Value>;
}

/// Probes connectivity and credentials for a scope.
#[async_trait]
pub trait ScopeProbe: Send + Sync {
    async fn probe(&self, ctx: &RequestContext, scope: &ScopeKey) -> FleetResult<HealthCheck>;
}

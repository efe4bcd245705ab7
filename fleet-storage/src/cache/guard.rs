//! Permission-aware cache guard.
//!
//! Consulted before a cached detail or YAML response is served. The guard
//! never caches its own decisions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{
    AccessAttributes, ApiIdentity, CheckerRegistry, ObjectRef, RequestContext, ResourceResolver,
    ResourceView, ScopeKey,
};

use super::bounded::ResponseCache;

/// Kinds whose access is governed by the secret that stores them.
const RELEASE_ALIASES: &[&str] = &["helmmanifest", "helmvalues", "helmrelease"];

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The checker allowed the read.
    Allowed,
    /// The checker explicitly denied the read; cached representations were
    /// evicted.
    Denied { reason: Option<String> },
    /// No conclusive answer; the cached response may be served.
    FailOpen { reason: String },
}

impl GuardDecision {
    pub fn can_serve(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied { .. } => "denied",
            Self::FailOpen { .. } => "fail_open",
        }
    }
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::Denied { reason: Some(r) } => write!(f, "denied: {}", r),
            Self::Denied { reason: None } => f.write_str("denied"),
            Self::FailOpen { reason } => write!(f, "fail open: {}", reason),
        }
    }
}

/// Identity whose read access controls `kind`, for the fixed release aliases.
fn alias_identity(kind: &str) -> Option<ApiIdentity> {
    let lowered = kind.to_ascii_lowercase();
    RELEASE_ALIASES
        .contains(&lowered.as_str())
        .then(|| ApiIdentity::new("", "v1", "secrets", true))
}

/// Re-authorizes cache hits and evicts on explicit denial.
pub struct PermissionGuard<V> {
    cache: Arc<ResponseCache<V>>,
    checkers: Arc<dyn CheckerRegistry>,
    resolver: Arc<dyn ResourceResolver>,
    check_ceiling: Duration,
}

impl<V: Clone> PermissionGuard<V> {
    /// `check_ceiling` bounds a check when the caller's context has no
    /// deadline of its own.
    pub fn new(
        cache: Arc<ResponseCache<V>>,
        checkers: Arc<dyn CheckerRegistry>,
        resolver: Arc<dyn ResourceResolver>,
        check_ceiling: Duration,
    ) -> Self {
        Self {
            cache,
            checkers,
            resolver,
            check_ceiling,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache<V>> {
        &self.cache
    }

    /// Whether a cached response for `object` may be served.
    pub async fn can_serve(&self, ctx: &RequestContext, scope: &ScopeKey, object: &ObjectRef) -> bool {
        self.evaluate(ctx, scope, object).await.can_serve()
    }

    /// Run the full check and report how the answer was reached.
    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        scope: &ScopeKey,
        object: &ObjectRef,
    ) -> GuardDecision {
        let Some(checker) = self.checkers.checker_for(scope) else {
            return GuardDecision::FailOpen {
                reason: "no authorization checker for scope".to_string(),
            };
        };

        let (identity, aliased) = match alias_identity(&object.kind) {
            Some(identity) => (identity, true),
            None => match self.resolver.resolve(scope, &object.kind).await {
                Ok(identity) => (identity, false),
                Err(e) => {
                    tracing::debug!(%scope, kind = %object.kind, error = %e, "guard failing open");
                    return GuardDecision::FailOpen {
                        reason: e.to_string(),
                    };
                }
            },
        };

        // Release aliases are checked against the namespace's secrets; the
        // storing secret's name differs from the release name.
        let namespace = object.namespace.as_deref().filter(|_| identity.namespaced);
        let name = (!aliased).then_some(object.name.as_str());
        let attributes = AccessAttributes::read(&identity, namespace, name);

        let timeout = ctx.remaining().unwrap_or(self.check_ceiling);
        let check_ctx = ctx.child().with_timeout(timeout);

        let decision = match tokio::time::timeout(timeout, checker.check(&check_ctx, &attributes)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!(%scope, kind = %object.kind, error = %e, "authorization check failed, serving cached response");
                return GuardDecision::FailOpen {
                    reason: e.to_string(),
                };
            }
            Err(_) => {
                tracing::warn!(%scope, kind = %object.kind, ?timeout, "authorization check timed out, serving cached response");
                return GuardDecision::FailOpen {
                    reason: format!("check timed out after {:?}", timeout),
                };
            }
        };

        if decision.allowed {
            return GuardDecision::Allowed;
        }

        let evicted = ResourceView::ALL
            .iter()
            .filter(|view| self.cache.delete(scope, &object.cache_key(**view)))
            .count();
        tracing::info!(
            %scope,
            kind = %object.kind,
            namespace = object.namespace.as_deref().unwrap_or(""),
            name = %object.name,
            evicted,
            "read access revoked, cached representations evicted"
        );

        GuardDecision::Denied {
            reason: decision.denied_reason,
        }
    }
}

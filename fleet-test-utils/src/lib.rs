//! FLEET Test Utilities
//!
//! Shared test infrastructure for the fleet workspace:
//! - Mock collaborators (authorization checker, kind resolver, access review
//!   connector, resource fetcher, scope probe)
//! - Proptest generators for scopes, resource keys, and capability requests

// Re-export core types for convenience
pub use fleet_core::{
    AccessAttributes, AccessReviewClient, AccessReviewConnector, ApiIdentity,
    AuthorizationChecker, AuthorizationError, CapabilityCheckRequest, CheckerRegistry,
    FleetError, FleetResult, HealthCheck, ObjectRef, PermissionDecision, RequestContext,
    ResolutionError, ResourceFetcher, ResourceResolver, ResourceView, ScopeKey, ScopeProbe,
};

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// AUTHORIZATION CHECKER
// ============================================================================

/// What [`MockChecker`] answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckBehavior {
    Allow,
    Deny(String),
    /// Backend error (inconclusive).
    Fail(String),
    /// Never answers.
    Hang,
}

/// Scriptable authorization checker that counts its calls.
#[derive(Debug)]
pub struct MockChecker {
    behavior: Mutex<CheckBehavior>,
    calls: AtomicUsize,
    last: Mutex<Option<AccessAttributes>>,
}

impl MockChecker {
    pub fn new(behavior: CheckBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn allowing() -> Self {
        Self::new(CheckBehavior::Allow)
    }

    pub fn denying(reason: impl Into<String>) -> Self {
        Self::new(CheckBehavior::Deny(reason.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(CheckBehavior::Fail(reason.into()))
    }

    pub fn hanging() -> Self {
        Self::new(CheckBehavior::Hang)
    }

    pub fn set_behavior(&self, behavior: CheckBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attributes of the most recent check.
    pub fn last_attributes(&self) -> Option<AccessAttributes> {
        lock(&self.last).clone()
    }
}

#[async_trait]
impl AuthorizationChecker for MockChecker {
    async fn check(
        &self,
        _ctx: &RequestContext,
        attributes: &AccessAttributes,
    ) -> Result<PermissionDecision, AuthorizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last) = Some(attributes.clone());

        let behavior = lock(&self.behavior).clone();
        match behavior {
            CheckBehavior::Allow => Ok(PermissionDecision::allow()),
            CheckBehavior::Deny(reason) => Ok(PermissionDecision::deny(reason)),
            CheckBehavior::Fail(reason) => Err(AuthorizationError::CheckFailed { reason }),
            CheckBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Fixed scope -> checker table.
#[derive(Default)]
pub struct MockCheckerRegistry {
    checkers: HashMap<ScopeKey, Arc<dyn AuthorizationChecker>>,
}

impl MockCheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checker(mut self, scope: &str, checker: Arc<dyn AuthorizationChecker>) -> Self {
        self.checkers.insert(ScopeKey::new(scope), checker);
        self
    }
}

impl CheckerRegistry for MockCheckerRegistry {
    fn checker_for(&self, scope: &ScopeKey) -> Option<Arc<dyn AuthorizationChecker>> {
        self.checkers.get(scope).cloned()
    }
}

// ============================================================================
// KIND RESOLVER
// ============================================================================

/// Kinds known to [`StaticResolver::new`].
pub const KNOWN_KINDS: &[&str] = &[
    "Pod",
    "Deployment",
    "ConfigMap",
    "Secret",
    "Node",
    "Namespace",
    "Service",
];

/// Case-insensitive kind table with the common built-in kinds preloaded.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    kinds: HashMap<String, ApiIdentity>,
    calls: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn new() -> Self {
        let builtin = [
            ("pod", ApiIdentity::new("", "v1", "pods", true)),
            ("deployment", ApiIdentity::new("apps", "v1", "deployments", true)),
            ("configmap", ApiIdentity::new("", "v1", "configmaps", true)),
            ("secret", ApiIdentity::new("", "v1", "secrets", true)),
            ("node", ApiIdentity::new("", "v1", "nodes", false)),
            ("namespace", ApiIdentity::new("", "v1", "namespaces", false)),
            ("service", ApiIdentity::new("", "v1", "services", true)),
        ];
        Self {
            kinds: builtin
                .into_iter()
                .map(|(kind, identity)| (kind.to_string(), identity))
                .collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_kind(mut self, kind: &str, identity: ApiIdentity) -> Self {
        self.kinds.insert(kind.to_ascii_lowercase(), identity);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceResolver for StaticResolver {
    async fn resolve(&self, _scope: &ScopeKey, kind: &str) -> Result<ApiIdentity, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.kinds
            .get(&kind.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownKind {
                kind: kind.to_string(),
            })
    }
}

// ============================================================================
// ACCESS REVIEW
// ============================================================================

/// Access review client that allows everything unless told otherwise.
///
/// Outcomes are keyed by plural resource name. Counts calls and items so
/// tests can assert on coalescing.
#[derive(Debug, Default)]
pub struct MockReviewClient {
    denied: HashMap<String, String>,
    failing: HashMap<String, String>,
    batch_failure: Option<AuthorizationError>,
    drop_results: bool,
    hang: bool,
    calls: AtomicUsize,
    items: AtomicUsize,
    last_batch: Mutex<Vec<AccessAttributes>>,
}

impl MockReviewClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_resource(mut self, resource: &str, reason: &str) -> Self {
        self.denied.insert(resource.to_string(), reason.to_string());
        self
    }

    /// Per-item evaluation error for every item on `resource`.
    pub fn fail_resource(mut self, resource: &str, reason: &str) -> Self {
        self.failing.insert(resource.to_string(), reason.to_string());
        self
    }

    /// Fail the whole review call.
    pub fn fail_batch(mut self, error: AuthorizationError) -> Self {
        self.batch_failure = Some(error);
        self
    }

    /// Return an empty result vector regardless of input.
    pub fn dropping_results(mut self) -> Self {
        self.drop_results = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total number of items across every review call.
    pub fn items(&self) -> usize {
        self.items.load(Ordering::SeqCst)
    }

    pub fn last_batch(&self) -> Vec<AccessAttributes> {
        lock(&self.last_batch).clone()
    }
}

#[async_trait]
impl AccessReviewClient for MockReviewClient {
    async fn review(
        &self,
        _ctx: &RequestContext,
        items: &[AccessAttributes],
    ) -> Result<Vec<Result<PermissionDecision, AuthorizationError>>, AuthorizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items.fetch_add(items.len(), Ordering::SeqCst);
        *lock(&self.last_batch) = items.to_vec();

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(error) = &self.batch_failure {
            return Err(error.clone());
        }
        if self.drop_results {
            return Ok(Vec::new());
        }

        Ok(items
            .iter()
            .map(|item| {
                if let Some(reason) = self.failing.get(&item.resource) {
                    return Err(AuthorizationError::CheckFailed {
                        reason: reason.clone(),
                    });
                }
                match self.denied.get(&item.resource) {
                    Some(reason) => Ok(PermissionDecision::deny(reason.clone())),
                    None => Ok(PermissionDecision::allow()),
                }
            })
            .collect())
    }
}

/// Connector handing out one shared [`MockReviewClient`].
#[derive(Debug)]
pub struct MockReviewConnector {
    client: Arc<MockReviewClient>,
    failure: Option<AuthorizationError>,
    connects: AtomicUsize,
}

impl MockReviewConnector {
    pub fn new(client: MockReviewClient) -> Self {
        Self {
            client: Arc::new(client),
            failure: None,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(AuthorizationError::ClientUnavailable {
                reason: reason.to_string(),
            }),
            ..Self::new(MockReviewClient::new())
        }
    }

    pub fn client(&self) -> &MockReviewClient {
        &self.client
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessReviewConnector for MockReviewConnector {
    async fn connect(
        &self,
        _ctx: &RequestContext,
        _scope: &ScopeKey,
    ) -> Result<Arc<dyn AccessReviewClient>, AuthorizationError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.client.clone()),
        }
    }
}

// ============================================================================
// RESOURCE FETCHER
// ============================================================================

/// In-memory object table keyed by `(scope, resource key)`.
#[derive(Debug, Default)]
pub struct MockFetcher {
    objects: Mutex<HashMap<(ScopeKey, String), serde_json::Value>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
    held: AtomicBool,
    started: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        scope: &str,
        object: &ObjectRef,
        view: ResourceView,
        value: serde_json::Value,
    ) {
        lock(&self.objects).insert((ScopeKey::new(scope), object.cache_key(view)), value);
    }

    /// Make every subsequent fetch fail (or succeed again with `None`).
    pub fn set_failure(&self, reason: Option<&str>) {
        *lock(&self.failure) = reason.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Park every subsequent fetch until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Let held fetches (and all later ones) through.
    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// Resolves once a held fetch has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(
        &self,
        _ctx: &RequestContext,
        scope: &ScopeKey,
        object: &ObjectRef,
        view: ResourceView,
    ) -> FleetResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.held.load(Ordering::SeqCst) {
            let released = self.release.notified();
            self.started.notify_one();
            released.await;
        }
        if let Some(reason) = lock(&self.failure).clone() {
            return Err(FleetError::fetch(reason));
        }
        lock(&self.objects)
            .get(&(scope.clone(), object.cache_key(view)))
            .cloned()
            .ok_or_else(|| FleetError::fetch(format!("{} not found", object.cache_key(view))))
    }
}

// ============================================================================
// SCOPE PROBE
// ============================================================================

/// What [`MockProbe`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeBehavior {
    Healthy,
    Unhealthy(String),
    Fail(String),
    /// Runs until the context is cancelled.
    Hang,
}

#[derive(Debug)]
pub struct MockProbe {
    behavior: Mutex<HashMap<ScopeKey, ProbeBehavior>>,
    calls: AtomicUsize,
    started: tokio::sync::Notify,
}

impl MockProbe {
    /// Every scope probes healthy until configured otherwise.
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            started: tokio::sync::Notify::new(),
        }
    }

    pub fn set_behavior(&self, scope: &str, behavior: ProbeBehavior) {
        lock(&self.behavior).insert(ScopeKey::new(scope), behavior);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Resolves once a probe has started after this call.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScopeProbe for MockProbe {
    async fn probe(&self, ctx: &RequestContext, scope: &ScopeKey) -> FleetResult<HealthCheck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        let behavior = lock(&self.behavior)
            .get(scope)
            .cloned()
            .unwrap_or(ProbeBehavior::Healthy);
        match behavior {
            ProbeBehavior::Healthy => Ok(HealthCheck::healthy(scope.clone()).with_response_time(3)),
            ProbeBehavior::Unhealthy(message) => Ok(HealthCheck::unhealthy(scope.clone(), message)),
            ProbeBehavior::Fail(reason) => Err(FleetError::fetch(reason)),
            ProbeBehavior::Hang => {
                ctx.run(std::future::pending::<FleetResult<HealthCheck>>())
                    .await
            }
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Generate a plausible kube context name.
pub fn arb_scope_key() -> impl Strategy<Value = ScopeKey> {
    "[a-z][a-z0-9-]{0,15}".prop_map(ScopeKey::new)
}

/// Generate an opaque resource key.
pub fn arb_resource_key() -> impl Strategy<Value = String> {
    "[a-z]{1,8}:[a-z0-9-]{1,12}"
}

/// Generate one of the kinds [`StaticResolver::new`] knows, in mixed case.
pub fn arb_known_kind() -> impl Strategy<Value = String> {
    (prop::sample::select(KNOWN_KINDS), any::<bool>()).prop_map(|(kind, upper)| {
        if upper {
            kind.to_ascii_uppercase()
        } else {
            kind.to_string()
        }
    })
}

/// Generate a capability request, some malformed, many overlapping.
///
/// The small value pools make duplicate authorization tuples common.
pub fn arb_capability_request() -> impl Strategy<Value = CapabilityCheckRequest> {
    let id = prop_oneof![
        4 => "[a-z0-9]{1,4}",
        1 => Just(String::new()),
    ];
    let verb = prop::sample::select(vec!["get", "list", " WATCH ", "delete", ""]);
    let kind = prop_oneof![
        6 => arb_known_kind(),
        1 => Just("Gizmo".to_string()),
        1 => Just("  ".to_string()),
    ];
    let namespace = prop::option::of(prop::sample::select(vec!["default", "kube-system", " "]));
    let name = prop::option::of(prop::sample::select(vec!["web", "api"]));

    (id, verb, kind, namespace, name).prop_map(|(id, verb, kind, namespace, name)| {
        CapabilityCheckRequest {
            id,
            verb: verb.to_string(),
            resource_kind: kind,
            namespace: namespace.map(str::to_string),
            name: name.map(str::to_string),
            subresource: None,
        }
    })
}

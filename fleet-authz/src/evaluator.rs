//! Capability batch evaluator.
//!
//! Requests are processed in stages, and a failure at any stage is written
//! into the failing request's own slot:
//!
//! 1. normalize and validate
//! 2. connect the access review client, once per batch
//! 3. resolve the resource kind
//! 4. coalesce requests with identical attribute tuples
//! 5. one review call for the unique tuples, fanned back out to every slot
//!
//! The result list is always parallel to the request list.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{
    AccessAttributes, AccessReviewConnector, ApiIdentity, AuthorizationError,
    CapabilityCheckRequest, CapabilityCheckResult, FleetError, RequestContext, ResolutionError,
    ResourceResolver, ScopeKey,
};
use indexmap::IndexMap;

/// Results of one batch plus how many checks were actually issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<CapabilityCheckResult>,
    /// Unique attribute tuples sent to the review backend.
    pub unique_checks: usize,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

/// Evaluates capability batches against a scope's access review backend.
pub struct CapabilityEvaluator {
    connector: Arc<dyn AccessReviewConnector>,
    resolver: Arc<dyn ResourceResolver>,
    batch_timeout: Duration,
}

impl CapabilityEvaluator {
    /// `batch_timeout` bounds client connection plus the review call.
    pub fn new(
        connector: Arc<dyn AccessReviewConnector>,
        resolver: Arc<dyn ResourceResolver>,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            resolver,
            batch_timeout,
        }
    }

    /// Evaluate `requests` and return one result per request, in order.
    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        scope: &ScopeKey,
        requests: Vec<CapabilityCheckRequest>,
    ) -> Vec<CapabilityCheckResult> {
        self.evaluate_batch(ctx, scope, requests).await.results
    }

    pub async fn evaluate_batch(
        &self,
        ctx: &RequestContext,
        scope: &ScopeKey,
        requests: Vec<CapabilityCheckRequest>,
    ) -> BatchReport {
        let requested = requests.len();
        let mut results = Vec::with_capacity(requested);
        let mut pending = Vec::new();

        for (index, request) in requests.into_iter().enumerate() {
            let request = request.normalized();
            let mut result = CapabilityCheckResult::pending(&request);
            match request.validate() {
                Ok(()) => pending.push((index, request)),
                Err(e) => result.fail(&e),
            }
            results.push(result);
        }

        if pending.is_empty() {
            return BatchReport {
                results,
                unique_checks: 0,
            };
        }

        let timeout = ctx
            .remaining()
            .map_or(self.batch_timeout, |remaining| remaining.min(self.batch_timeout));
        let batch_ctx = ctx.child().with_timeout(timeout);

        let client = match tokio::time::timeout(timeout, self.connector.connect(&batch_ctx, scope)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                tracing::warn!(%scope, error = %e, "access review client unavailable");
                fail_all(&mut results, pending.iter().map(|(i, _)| *i), e);
                return BatchReport {
                    results,
                    unique_checks: 0,
                };
            }
            Err(_) => {
                fail_all(
                    &mut results,
                    pending.iter().map(|(i, _)| *i),
                    AuthorizationError::Timeout { after: timeout },
                );
                return BatchReport {
                    results,
                    unique_checks: 0,
                };
            }
        };

        let mut identities: HashMap<String, Result<ApiIdentity, ResolutionError>> = HashMap::new();
        let mut unique: IndexMap<AccessAttributes, Vec<usize>> = IndexMap::new();

        for (index, request) in pending {
            let kind_key = request.resource_kind.to_ascii_lowercase();
            let resolved = match identities.get(&kind_key) {
                Some(resolved) => resolved.clone(),
                None => {
                    let resolved = self.resolver.resolve(scope, &request.resource_kind).await;
                    identities.insert(kind_key, resolved.clone());
                    resolved
                }
            };

            match resolved {
                Ok(identity) => {
                    let attributes = attributes_for(&identity, request);
                    unique.entry(attributes).or_default().push(index);
                }
                Err(e) => results[index].fail(&FleetError::from(e)),
            }
        }

        if unique.is_empty() {
            return BatchReport {
                results,
                unique_checks: 0,
            };
        }

        let items: Vec<AccessAttributes> = unique.keys().cloned().collect();
        let review_timeout = batch_ctx.remaining().unwrap_or(timeout);

        match tokio::time::timeout(review_timeout, client.review(&batch_ctx, &items)).await {
            Ok(Ok(decisions)) => {
                for (position, slots) in unique.values().enumerate() {
                    match decisions.get(position) {
                        Some(Ok(decision)) => {
                            for &slot in slots {
                                results[slot].apply(decision);
                            }
                        }
                        Some(Err(e)) => fail_all(&mut results, slots.iter().copied(), e.clone()),
                        None => fail_all(
                            &mut results,
                            slots.iter().copied(),
                            AuthorizationError::MissingResult { index: position },
                        ),
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(%scope, error = %e, "access review call failed");
                fail_all(&mut results, unique.values().flatten().copied(), e);
            }
            Err(_) => {
                tracing::warn!(%scope, ?review_timeout, "access review call timed out");
                fail_all(
                    &mut results,
                    unique.values().flatten().copied(),
                    AuthorizationError::Timeout { after: timeout },
                );
            }
        }

        tracing::debug!(
            %scope,
            requested,
            unique = items.len(),
            "capability batch evaluated"
        );

        BatchReport {
            results,
            unique_checks: items.len(),
        }
    }
}

/// Attribute tuple for a validated request. Cluster-scoped kinds ignore the
/// namespace, so per-namespace probes of them coalesce.
fn attributes_for(identity: &ApiIdentity, request: CapabilityCheckRequest) -> AccessAttributes {
    AccessAttributes {
        group: identity.group.clone(),
        version: identity.version.clone(),
        resource: identity.resource.clone(),
        verb: request.verb,
        namespace: request.namespace.filter(|_| identity.namespaced),
        name: request.name,
        subresource: request.subresource,
    }
}

fn fail_all(
    results: &mut [CapabilityCheckResult],
    slots: impl IntoIterator<Item = usize>,
    error: AuthorizationError,
) {
    let error = FleetError::from(error);
    for slot in slots {
        results[slot].fail(&error);
    }
}

//! Capability batch endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use fleet_authz::CapabilityEvaluator;
use fleet_core::{CapabilityCheckRequest, CapabilityCheckResult, RequestContext, ScopeKey};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;
use crate::selector::ScopeSelector;
use crate::telemetry::metrics;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityBatchRequest {
    #[serde(default)]
    pub checks: Vec<CapabilityCheckRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub requested: usize,
    /// Distinct checks sent to the cluster after coalescing.
    pub unique_checks: usize,
    pub allowed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityBatchResponse {
    pub scope: ScopeKey,
    pub results: Vec<CapabilityCheckResult>,
    pub summary: BatchSummary,
}

/// POST /api/v1/capabilities
///
/// Per-check failures are reported inside `results`; the request itself
/// only fails on a malformed body or scope.
pub async fn check_capabilities(
    State(evaluator): State<Arc<CapabilityEvaluator>>,
    State(shutdown): State<CancellationToken>,
    ScopeSelector(scope): ScopeSelector,
    Json(body): Json<CapabilityBatchRequest>,
) -> ApiResult<Json<CapabilityBatchResponse>> {
    let requested = body.checks.len();
    let report = evaluator
        .evaluate_batch(&RequestContext::from_token(shutdown.child_token()), &scope, body.checks)
        .await;

    if let Some(metrics) = metrics() {
        metrics.record_capability_batch(requested, report.unique_checks);
    }

    let summary = BatchSummary {
        requested,
        unique_checks: report.unique_checks,
        allowed: report.results.iter().filter(|r| r.allowed).count(),
        failed: report.failed(),
    };
    tracing::debug!(%scope, ?summary, "capability batch evaluated");

    Ok(Json(CapabilityBatchResponse {
        scope,
        results: report.results,
        summary,
    }))
}

//! Health endpoints.
//!
//! - `GET /health` - process liveness, no scope required
//! - `POST /api/v1/health` - probe the selected scope's cluster

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_core::RequestContext;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::selector::ScopeSelector;
use crate::state::AppState;
use crate::telemetry::metrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Scopes with a coordinated operation in flight.
    pub active_operations: usize,
    pub selection_generation: u64,
}

/// GET /health
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_operations: state.coordinator.active_scopes().len(),
        selection_generation: state.sequencer.current_generation(),
    })
}

/// POST /api/v1/health
///
/// Runs as the scope's coordinated operation, so a newer probe of the same
/// scope replaces an older one. The replaced request answers
/// `202 {"superseded": true}`.
pub async fn probe_scope(
    State(state): State<AppState>,
    ScopeSelector(scope): ScopeSelector,
) -> ApiResult<Response> {
    let parent = RequestContext::from_token(state.shutdown.child_token())
        .with_timeout(state.config.server.fetch_timeout);
    let probe = Arc::clone(&state.probe);

    let outcome = state
        .coordinator
        .run_cluster_operation(&scope, &parent, |ctx| {
            let probe = Arc::clone(&probe);
            let scope = scope.clone();
            async move { ctx.run(probe.probe(&ctx, &scope)).await }
        })
        .await;

    if let Some(metrics) = metrics() {
        let label = match &outcome {
            Ok(Some(_)) => "completed",
            Ok(None) => "superseded",
            Err(e) if e.is_cancellation() => "cancelled",
            Err(_) => "failed",
        };
        metrics.record_cluster_operation("health_probe", label);
    }

    Ok(match outcome? {
        Some(health) => {
            let status = if health.is_usable() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(health)).into_response()
        }
        None => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "superseded": true })),
        )
            .into_response(),
    })
}

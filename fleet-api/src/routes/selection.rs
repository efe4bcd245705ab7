//! Active scope selection.
//!
//! Selecting a scope is a sequenced mutation: the newest request wins, and an
//! older one that is still probing its scope unwinds without publishing.
//! Switching away from a scope cancels its in-flight work and drops its
//! cached responses and version records.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_coord::MutationContext;
use fleet_core::{FleetError, FleetResult, HealthCheck, ScopeKey};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::{AppState, Selection};
use crate::telemetry::metrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectScopeRequest {
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub scope: ScopeKey,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ScopeKey>,
    /// Cached responses dropped for the previous scope.
    pub invalidated: usize,
    pub health: HealthCheck,
}

/// GET /api/v1/selection
pub async fn current_selection(State(state): State<AppState>) -> Json<Selection> {
    Json(state.selection.snapshot())
}

/// POST /api/v1/selection
///
/// Answers `202 {"superseded": true}` when a newer selection replaced this
/// one before it was published.
pub async fn select_scope(
    State(state): State<AppState>,
    Json(body): Json<SelectScopeRequest>,
) -> ApiResult<Response> {
    let scope = ScopeKey::parse(&body.scope)?;

    let outcome = state
        .sequencer
        .run_selection_mutation("select-scope", |mutation| {
            apply_selection(&state, scope.clone(), mutation)
        })
        .await;

    if let Some(metrics) = metrics() {
        let label = match &outcome {
            Ok(Some(_)) => "applied",
            Ok(None) => "superseded",
            Err(_) => "failed",
        };
        metrics.record_selection_mutation(label);
    }

    Ok(match outcome? {
        Some(applied) => (StatusCode::OK, Json(applied)).into_response(),
        None => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "superseded": true })),
        )
            .into_response(),
    })
}

async fn apply_selection(
    state: &AppState,
    scope: ScopeKey,
    mutation: MutationContext,
) -> FleetResult<SelectionResponse> {
    let ctx = mutation
        .context()
        .clone()
        .with_timeout(state.config.server.fetch_timeout);

    let health = ctx.run(state.probe.probe(&ctx, &scope)).await?;
    if !health.is_usable() {
        return Err(FleetError::fetch(format!(
            "scope '{}' is not usable: {}",
            scope,
            health.message.as_deref().unwrap_or("probe failed")
        )));
    }

    if !state.sequencer.is_current(mutation.generation()) {
        return Err(FleetError::Cancelled);
    }
    let previous = state
        .selection
        .publish(scope.clone(), mutation.generation())
        .map_err(|_| FleetError::Cancelled)?;

    let mut invalidated = 0;
    if let Some(previous) = previous.as_ref().filter(|p| **p != scope) {
        // Revoke before invalidating so no read of `previous` can refill
        // the cache afterwards.
        state.scopes.revoke(previous);
        state.coordinator.cancel(previous);
        invalidated = state.cache.invalidate_scope(previous);
        let forgotten = state.versions.forget_scope(previous);
        tracing::info!(
            from = %previous,
            to = %scope,
            generation = mutation.generation(),
            invalidated,
            forgotten,
            "selection switched"
        );
    }

    Ok(SelectionResponse {
        scope,
        generation: mutation.generation(),
        previous,
        invalidated,
        health,
    })
}

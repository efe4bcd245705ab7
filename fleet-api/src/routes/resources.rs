//! Resource read endpoint.
//!
//! Reads go through the response cache. A cache hit is re-authorized by the
//! permission guard before it is served; a miss (or a revoked hit) fetches
//! from the cluster and repopulates the cache. Every answer is versioned so
//! clients can skip unchanged payloads.
//!
//! Reads run under their scope's token. Once the scope is deselected a read
//! still in flight fails with `Cancelled` and leaves nothing in the cache.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use fleet_core::{FleetError, FleetResult, ObjectRef, RequestContext, ResourceView, ScopeKey};
use fleet_storage::{versioned, ScopedKey, VersionedResponse};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::selector::ScopeSelector;
use crate::state::AppState;
use crate::telemetry::metrics;

/// Path placeholder for a cluster-scoped object's namespace.
pub const CLUSTER_SCOPED: &str = "_";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceParams {
    /// `detail` (default) or `yaml`.
    pub view: Option<String>,
    /// Version the client already holds.
    pub version: Option<String>,
}

fn parse_view(raw: Option<&str>) -> ApiResult<ResourceView> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(ResourceView::default()),
        Some(value) => ResourceView::ALL
            .into_iter()
            .find(|view| view.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                ApiError::invalid_input(format!(
                    "Unknown view '{}'; expected 'detail' or 'yaml'",
                    value
                ))
            }),
    }
}

/// GET /api/v1/resources/:kind/:namespace/:name
pub async fn get_resource(
    State(state): State<AppState>,
    ScopeSelector(scope): ScopeSelector,
    Path((kind, namespace, name)): Path<(String, String, String)>,
    Query(params): Query<ResourceParams>,
) -> ApiResult<Json<VersionedResponse<serde_json::Value>>> {
    let view = parse_view(params.view.as_deref())?;
    let namespace = (namespace != CLUSTER_SCOPED).then_some(namespace.as_str());
    let object = ObjectRef::new(kind, namespace, name);
    let key = object.cache_key(view);

    let ctx = state
        .scopes
        .context(&scope)
        .with_timeout(state.config.server.fetch_timeout);

    let response = versioned(
        state.versions.as_ref(),
        &version_key(&scope, &key),
        None,
        || read_through(&state, &ctx, &scope, &object, view, &key),
        params.version.as_deref().unwrap_or(""),
    )
    .await?;

    Ok(Json(response))
}

fn version_key(scope: &ScopeKey, key: &str) -> String {
    ScopedKey::new(scope, key).to_string()
}

async fn read_through(
    state: &AppState,
    ctx: &RequestContext,
    scope: &ScopeKey,
    object: &ObjectRef,
    view: ResourceView,
    key: &str,
) -> FleetResult<serde_json::Value> {
    if let Some(cached) = state.cache.get(scope, key) {
        let decision = state.guard.evaluate(ctx, scope, object).await;
        if let Some(metrics) = metrics() {
            metrics.record_guard_decision(decision.label());
        }
        if decision.can_serve() {
            tracing::trace!(%scope, key, %decision, "serving cached response");
            return Ok(cached);
        }
        for revoked in ResourceView::ALL {
            state
                .versions
                .forget(&version_key(scope, &object.cache_key(revoked)));
        }
    }

    let value = ctx.run(state.fetcher.fetch(ctx, scope, object, view)).await?;
    fill(state, ctx, scope, key, value.clone())?;
    Ok(value)
}

/// Cache `value` unless the scope was revoked while it was being fetched.
///
/// Checked again after the write: a revocation racing the `set` either
/// precedes it (nothing written) or follows it and is undone here.
fn fill(
    state: &AppState,
    ctx: &RequestContext,
    scope: &ScopeKey,
    key: &str,
    value: serde_json::Value,
) -> FleetResult<()> {
    if ctx.is_cancelled() {
        return Err(FleetError::Cancelled);
    }
    state.cache.set(scope, key, value);
    if ctx.is_cancelled() {
        state.cache.delete(scope, key);
        tracing::debug!(%scope, key, "dropped response fetched for a revoked scope");
        return Err(FleetError::Cancelled);
    }
    Ok(())
}

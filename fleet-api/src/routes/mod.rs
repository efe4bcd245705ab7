//! REST API Routes Module
//!
//! - `GET  /health` - liveness
//! - `GET  /metrics` - Prometheus scrape
//! - `GET  /api/v1/resources/:kind/:namespace/:name` - cached, guarded reads
//! - `POST /api/v1/capabilities` - capability batches
//! - `GET|POST /api/v1/selection` - active scope selection
//! - `POST /api/v1/health` - coordinated cluster probe
//!
//! Scoped endpoints take their scope from [`ScopeSelector`](crate::selector::ScopeSelector).

pub mod capabilities;
pub mod health;
pub mod resources;
pub mod selection;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/resources/:kind/:namespace/:name",
            get(resources::get_resource),
        )
        .route("/capabilities", post(capabilities::check_capabilities))
        .route(
            "/selection",
            get(selection::current_selection).post(selection::select_scope),
        )
        .route("/health", post(health::probe_scope))
}

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! FLEET API Server Entry Point
//!
//! Loads configuration from the environment, assembles application state,
//! and serves the router until interrupted.

use std::net::SocketAddr;

use fleet_api::{create_router, init_tracing, ApiError, ApiResult, AppState, Collaborators};
use fleet_core::FleetConfig;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = FleetConfig::from_env();
    init_tracing(config.server.log_format)?;
    config.validate()?;

    let addr: SocketAddr = config.server.bind.parse().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", config.server.bind, e))
    })?;

    tracing::warn!("no cluster client configured; scoped requests will report upstream errors");
    let state = AppState::new(config, Collaborators::detached());
    let sweeper = state.start_background_tasks();
    let app = create_router(state.clone());

    tracing::info!(%addr, "Starting FLEET API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    state.shutdown();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "cache sweeper did not stop cleanly");
        }
    }
    Ok(())
}

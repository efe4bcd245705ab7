//! Axum Middleware for HTTP Request Metrics
//!
//! Records every request against its matched route template rather than the
//! raw path, so scope names and object names never become label values.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
        http.status_code = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    span.record("http.status_code", status);

    let duration = start.elapsed().as_secs_f64();
    if let Some(metrics) = metrics() {
        metrics.record_http_request(method.as_str(), &route, status, duration);
    }

    response
}

//! Prometheus Metrics Definitions
//!
//! Defines all FLEET metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge_vec,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGaugeVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<FleetMetrics>> = Lazy::new(FleetMetrics::new);

/// The registered metrics, if registration succeeded.
pub fn metrics() -> Option<&'static FleetMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all FLEET metrics.
#[derive(Clone)]
pub struct FleetMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Coordinated cluster operations - labels: kind, outcome
    pub cluster_operations_total: CounterVec,

    /// Selection mutations - labels: outcome
    pub selection_mutations_total: CounterVec,

    /// Cache guard decisions - labels: decision
    pub guard_decisions_total: CounterVec,

    /// Capability checks received in batches
    pub capability_checks_requested_total: IntCounter,

    /// Unique capability checks sent to the authorization backend
    pub capability_checks_issued_total: IntCounter,

    /// Response cache counters sampled at scrape time - labels: stat
    pub response_cache: IntGaugeVec,
}

impl FleetMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "fleet_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "fleet_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cluster_operations_total: register_counter_vec!(
                "fleet_cluster_operations_total",
                "Coordinated cluster operations by outcome",
                &["kind", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cluster_operations_total: {}", e)))?,

            selection_mutations_total: register_counter_vec!(
                "fleet_selection_mutations_total",
                "Selection mutations by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register selection_mutations_total: {}", e)))?,

            guard_decisions_total: register_counter_vec!(
                "fleet_cache_guard_decisions_total",
                "Permission guard decisions on cache hits",
                &["decision"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register guard_decisions_total: {}", e)))?,

            capability_checks_requested_total: register_int_counter!(
                "fleet_capability_checks_requested_total",
                "Capability checks received in batches"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register capability_checks_requested_total: {}", e)))?,

            capability_checks_issued_total: register_int_counter!(
                "fleet_capability_checks_issued_total",
                "Unique capability checks sent to the authorization backend"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register capability_checks_issued_total: {}", e)))?,

            response_cache: register_int_gauge_vec!(
                "fleet_response_cache",
                "Response cache counters",
                &["stat"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register response_cache: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one coordinated cluster operation.
    pub fn record_cluster_operation(&self, kind: &str, outcome: &str) {
        self.cluster_operations_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    pub fn record_selection_mutation(&self, outcome: &str) {
        self.selection_mutations_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_guard_decision(&self, decision: &str) {
        self.guard_decisions_total
            .with_label_values(&[decision])
            .inc();
    }

    /// Record a capability batch: checks received vs unique checks issued.
    pub fn record_capability_batch(&self, requested: usize, issued: usize) {
        self.capability_checks_requested_total.inc_by(requested as u64);
        self.capability_checks_issued_total.inc_by(issued as u64);
    }

    fn sample_cache(&self, state: &AppState) {
        let stats = state.cache.stats();
        for (stat, value) in [
            ("entries", stats.entry_count),
            ("hits", stats.hits),
            ("misses", stats.misses),
            ("evictions", stats.evictions),
            ("expirations", stats.expirations),
        ] {
            self.response_cache
                .with_label_values(&[stat])
                .set(value as i64);
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(metrics) = metrics() {
        metrics.sample_cache(&state);
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

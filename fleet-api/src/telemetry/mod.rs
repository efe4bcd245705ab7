//! FLEET Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the API
//! layer.

pub mod metrics;
pub mod middleware;
pub mod subscriber;

pub use metrics::{metrics, metrics_handler, FleetMetrics, METRICS};
pub use middleware::observability_middleware;
pub use subscriber::init_tracing;

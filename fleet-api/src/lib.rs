//! FLEET API - HTTP Routing Boundary
//!
//! Axum routes in front of the coordination, cache, and authorization
//! layers. Each scoped request resolves exactly one scope through
//! [`ScopeSelector`] before any handler runs.

#[macro_use]
pub mod macros;

pub mod detached;
pub mod error;
pub mod kinds;
pub mod routes;
pub mod selector;
pub mod state;
pub mod telemetry;

pub use detached::DetachedCluster;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use kinds::CoreKindResolver;
pub use routes::create_router;
pub use selector::{ScopeSelector, SCOPE_HEADER, SCOPE_PARAM};
pub use state::{AppState, Collaborators, Selection, SelectionState};
pub use telemetry::{init_tracing, metrics_handler, observability_middleware};

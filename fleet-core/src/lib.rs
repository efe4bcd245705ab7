//! FLEET Core - Shared Types
//!
//! Scope keys, request contexts, errors, configuration, and the narrow
//! collaborator traits that the coordination, cache, and authorization
//! crates are written against. No crate below this one talks to a cluster
//! directly; everything cluster-shaped arrives through a trait in
//! [`collaborators`].

pub mod authz;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod resource;
pub mod scope;

pub use authz::{
    AccessAttributes, ApiIdentity, CapabilityCheckRequest, CapabilityCheckResult,
    PermissionDecision, READ_VERB,
};
pub use collaborators::{
    AccessReviewClient, AccessReviewConnector, AuthorizationChecker, CheckerRegistry,
    ResourceFetcher, ResourceResolver, ScopeProbe, VersionCheck, VersionStore,
};
pub use config::{AuthzSettings, CacheSettings, FleetConfig, LogFormat, ServerSettings};
pub use context::RequestContext;
pub use error::{
    AuthorizationError, ConfigError, FleetError, FleetResult, ResolutionError, ValidationError,
};
pub use health::{HealthCheck, HealthStatus};
pub use resource::{ObjectRef, ResourceView};
pub use scope::ScopeKey;

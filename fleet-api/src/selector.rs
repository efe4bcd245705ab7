//! Scope selector extractor.
//!
//! A request names its scope with `X-Fleet-Scope` headers and/or `scope`
//! query parameters. Repeats of the same value are fine; two different
//! values, or none at all, reject the request before the handler runs.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use fleet_core::ScopeKey;

use crate::error::ApiError;

/// Header carrying the target scope.
pub const SCOPE_HEADER: &str = "x-fleet-scope";

/// Query parameter carrying the target scope.
pub const SCOPE_PARAM: &str = "scope";

/// The single scope a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSelector(pub ScopeKey);

impl ScopeSelector {
    pub fn scope(&self) -> &ScopeKey {
        &self.0
    }

    pub fn into_inner(self) -> ScopeKey {
        self.0
    }
}

/// Collect the distinct non-blank scopes named in `parts`, in order of
/// appearance (headers first).
fn requested_scopes(parts: &Parts) -> Result<Vec<ScopeKey>, ApiError> {
    let mut raw = Vec::new();
    for value in parts.headers.get_all(SCOPE_HEADER) {
        let value = value
            .to_str()
            .map_err(|_| ApiError::invalid_input("Scope header is not valid UTF-8"))?;
        raw.push(value.to_string());
    }

    if parts.uri.query().is_some() {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::invalid_input(format!("Invalid query string: {}", e)))?;
        raw.extend(
            pairs
                .into_iter()
                .filter(|(key, _)| key == SCOPE_PARAM)
                .map(|(_, value)| value),
        );
    }

    let mut scopes: Vec<ScopeKey> = Vec::new();
    for value in raw.iter().filter(|v| !v.trim().is_empty()) {
        let scope = ScopeKey::parse(value)?;
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    Ok(scopes)
}

#[async_trait]
impl<S> FromRequestParts<S> for ScopeSelector
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut scopes = requested_scopes(parts)?;
        match scopes.len() {
            0 => Err(ApiError::missing_field(SCOPE_PARAM)),
            1 => Ok(ScopeSelector(scopes.remove(0))),
            _ => {
                let names: Vec<&str> = scopes.iter().map(ScopeKey::as_str).collect();
                tracing::debug!(scopes = ?names, "request names more than one scope");
                Err(ApiError::invalid_input(format!(
                    "Request names {} different scopes; exactly one is allowed",
                    scopes.len()
                ))
                .with_details(serde_json::json!({ "scopes": names })))
            }
        }
    }
}

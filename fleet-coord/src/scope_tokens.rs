//! Per-scope cancellation.
//!
//! Every piece of work bound to a scope (reads, cache fills) derives its
//! context from that scope's token. Revoking a scope cancels all of it at
//! once; the next request for the scope gets a fresh token.

use dashmap::DashMap;
use fleet_core::{RequestContext, ScopeKey};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ScopeTokens {
    parent: CancellationToken,
    tokens: DashMap<ScopeKey, CancellationToken>,
}

impl ScopeTokens {
    /// Scope tokens are children of `parent`, so cancelling it reaches every
    /// scope.
    pub fn new(parent: CancellationToken) -> Self {
        Self {
            parent,
            tokens: DashMap::new(),
        }
    }

    /// A context for new work under `scope`.
    ///
    /// The context holds a child token: cancelling it does not revoke the
    /// scope.
    pub fn context(&self, scope: &ScopeKey) -> RequestContext {
        let token = self
            .tokens
            .entry(scope.clone())
            .or_insert_with(|| self.parent.child_token())
            .child_token();
        RequestContext::from_token(token)
    }

    /// Cancel everything started under `scope`. Returns whether the scope had
    /// a live token.
    pub fn revoke(&self, scope: &ScopeKey) -> bool {
        match self.tokens.remove(scope) {
            Some((_, token)) => {
                token.cancel();
                tracing::debug!(%scope, "scope work revoked");
                true
            }
            None => false,
        }
    }

    /// Number of scopes holding a live token.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

//! Request contexts: hierarchical cancellation plus an optional deadline.
//!
//! Cancelling a context cancels every context derived from it with
//! [`RequestContext::child`]. Cancellation is advisory: callees observe it
//! through [`RequestContext::cancelled`] or by wrapping their work in
//! [`RequestContext::run`]; nothing is forcibly interrupted.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{FleetError, FleetResult};

/// Cancellation handle and deadline carried by every cluster-bound call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A fresh root context with no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing token as a context with no deadline.
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derive a child: cancelled when this context is, same deadline.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Tighten the deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Resolves once this context (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Drive `work` until it finishes, the context is cancelled, or the
    /// deadline passes, whichever comes first.
    ///
    /// Cancellation maps to [`FleetError::Cancelled`], deadline expiry to
    /// [`FleetError::DeadlineExceeded`]. The abandoned future is dropped.
    pub async fn run<T, F>(&self, work: F) -> FleetResult<T>
    where
        F: Future<Output = FleetResult<T>>,
    {
        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FleetError::Cancelled),
            _ = expiry => Err(FleetError::DeadlineExceeded),
            result = work => result,
        }
    }
}

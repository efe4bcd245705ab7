//! Scoped operation coordinator.
//!
//! A preemptive single-flight executor keyed by scope. Registering a new
//! operation for a scope cancels the operation already registered there and
//! starts immediately; it never waits for the superseded work to notice.
//! There is no queueing mode.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use fleet_core::{FleetError, FleetResult, RequestContext, ScopeKey};
use tokio_util::sync::CancellationToken;

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const SUPERSEDED: u8 = 2;

/// Whichever of "work returned" and "a newer operation arrived" happens
/// first. Settled exactly once.
#[derive(Debug, Default)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    /// Mark the operation replaced. False if its work had already returned.
    fn supersede(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, SUPERSEDED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the work returned. True if it was superseded before that.
    fn finish(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_err_and(|state| state == SUPERSEDED)
    }
}

/// Bookkeeping for the live operation of one scope.
#[derive(Debug)]
struct OperationRecord {
    id: u64,
    cancel: CancellationToken,
    lifecycle: Arc<Lifecycle>,
}

/// Result of one coordinated execution plus whether it was superseded.
struct Execution<T> {
    result: FleetResult<T>,
    superseded: bool,
}

/// Clears a scope's record on drop if it still belongs to the same operation.
///
/// Runs on normal completion and also when the caller drops the future
/// mid-flight, so an abandoned operation never pins its scope.
struct RecordRelease<'a> {
    operations: &'a DashMap<ScopeKey, OperationRecord>,
    scope: &'a ScopeKey,
    id: u64,
}

impl Drop for RecordRelease<'_> {
    fn drop(&mut self) {
        self.operations
            .remove_if(self.scope, |_, record| record.id == self.id);
    }
}

/// Per-scope preemptive single-flight executor.
#[derive(Debug, Default)]
pub struct ScopedCoordinator {
    operations: DashMap<ScopeKey, OperationRecord>,
    next_id: AtomicU64,
}

impl ScopedCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` as the live operation for `scope`.
    ///
    /// `work` receives a context derived from `parent`, so an outer
    /// cancellation or deadline still applies. Any operation already
    /// registered for the scope is cancelled first. Blocks until `work`
    /// returns and hands back exactly what it returned, including a
    /// cancellation-kind error.
    pub async fn run<T, F, Fut>(
        &self,
        scope: &ScopeKey,
        parent: &RequestContext,
        work: F,
    ) -> FleetResult<T>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        self.execute(scope, parent, work).await.result
    }

    /// Like [`run`](Self::run), but supersession is a silent outcome.
    ///
    /// When `work` fails with [`FleetError::Cancelled`] because a newer
    /// operation replaced it on this scope (and the parent was not itself
    /// cancelled), this returns `Ok(None)`. Every other error passes through.
    pub async fn run_cluster_operation<T, F, Fut>(
        &self,
        scope: &ScopeKey,
        parent: &RequestContext,
        work: F,
    ) -> FleetResult<Option<T>>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        let execution = self.execute(scope, parent, work).await;
        match execution.result {
            Ok(value) => Ok(Some(value)),
            Err(FleetError::Cancelled) if execution.superseded && !parent.is_cancelled() => {
                tracing::debug!(%scope, "superseded cluster operation finished");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn execute<T, F, Fut>(
        &self,
        scope: &ScopeKey,
        parent: &RequestContext,
        work: F,
    ) -> Execution<T>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        let ctx = parent.child();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let lifecycle = Arc::new(Lifecycle::default());

        let record = OperationRecord {
            id,
            cancel: ctx.token().clone(),
            lifecycle: Arc::clone(&lifecycle),
        };

        if let Some(previous) = self.operations.insert(scope.clone(), record) {
            if previous.lifecycle.supersede() {
                tracing::debug!(
                    %scope,
                    superseded_id = previous.id,
                    operation_id = id,
                    "superseding in-flight operation"
                );
            }
            previous.cancel.cancel();
        }

        let _release = RecordRelease {
            operations: &self.operations,
            scope,
            id,
        };

        let result = work(ctx).await;
        Execution {
            result,
            superseded: lifecycle.finish(),
        }
    }

    /// True if an operation is currently registered for `scope`.
    pub fn is_active(&self, scope: &ScopeKey) -> bool {
        self.operations.contains_key(scope)
    }

    /// Scopes with a registered operation, in no particular order.
    pub fn active_scopes(&self) -> Vec<ScopeKey> {
        self.operations.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Cancel the operation registered for `scope`, e.g. when the scope is
    /// removed. This is not supersession: the operation's cancellation error
    /// is surfaced by [`run_cluster_operation`](Self::run_cluster_operation).
    pub fn cancel(&self, scope: &ScopeKey) -> bool {
        match self.operations.remove(scope) {
            Some((_, record)) => {
                record.cancel.cancel();
                tracing::debug!(%scope, operation_id = record.id, "operation cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every registered operation. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let scopes = self.active_scopes();
        scopes.iter().filter(|scope| self.cancel(scope)).count()
    }
}

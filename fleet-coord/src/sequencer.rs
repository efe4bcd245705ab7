//! Selection mutation sequencer.
//!
//! Every change to which cluster/config is active (selection switches,
//! transport rebuilds, auth-state transitions) goes through
//! [`SelectionSequencer::mutate`]. Each accepted mutation gets the next
//! generation and cancels the mutation that was outstanding before it, so
//! concurrent triggers collapse onto the latest generation instead of
//! interleaving.
//!
//! The slot lock is held only while the generation is assigned and the
//! outstanding token swapped. The callback runs with no lock held and is free
//! to take its own locks, or even to start another mutation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use fleet_core::{FleetError, FleetResult, RequestContext};
use tokio_util::sync::CancellationToken;

/// Context handed to a mutation callback, valid for the callback's duration.
#[derive(Debug, Clone)]
pub struct MutationContext {
    generation: u64,
    ctx: RequestContext,
}

impl MutationContext {
    /// The generation assigned to this mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled when a later mutation is accepted or the sequencer shuts down.
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }
}

#[derive(Debug)]
struct Outstanding {
    generation: u64,
    cancel: CancellationToken,
}

/// Clears the outstanding slot when the mutation that owns it finishes.
struct OutstandingRelease<'a> {
    sequencer: &'a SelectionSequencer,
    generation: u64,
}

impl Drop for OutstandingRelease<'_> {
    fn drop(&mut self) {
        let mut slot = self.sequencer.lock_slot();
        if slot
            .as_ref()
            .is_some_and(|outstanding| outstanding.generation == self.generation)
        {
            *slot = None;
        }
    }
}

/// Generation-stamped global mutation boundary.
#[derive(Debug, Default)]
pub struct SelectionSequencer {
    generation: AtomicU64,
    outstanding: Mutex<Option<Outstanding>>,
    root: CancellationToken,
}

impl SelectionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<Outstanding>> {
        // The slot is a plain Option; a panic elsewhere cannot leave it torn.
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The generation of the most recently accepted mutation (0 before any).
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// True if no mutation has been accepted after `generation`.
    ///
    /// Callbacks check this right before publishing results so a superseded
    /// mutation never overwrites a newer selection.
    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    /// Accept a mutation and run `callback` under it.
    ///
    /// The generation is assigned and the previous mutation's context
    /// cancelled before `callback` starts. The callback's result, including
    /// any error, is returned unchanged.
    pub async fn mutate<T, F, Fut>(&self, label: &str, callback: F) -> FleetResult<T>
    where
        F: FnOnce(MutationContext) -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        let mutation = {
            let mut slot = self.lock_slot();
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

            if let Some(previous) = slot.take() {
                previous.cancel.cancel();
                tracing::debug!(
                    label,
                    generation,
                    superseded = previous.generation,
                    "selection mutation superseded"
                );
            }

            let cancel = self.root.child_token();
            *slot = Some(Outstanding {
                generation,
                cancel: cancel.clone(),
            });

            MutationContext {
                generation,
                ctx: RequestContext::from_token(cancel),
            }
        };

        tracing::debug!(label, generation = mutation.generation, "selection mutation accepted");

        let _release = OutstandingRelease {
            sequencer: self,
            generation: mutation.generation,
        };
        callback(mutation).await
    }

    /// [`mutate`](Self::mutate) with supersession treated as a silent outcome.
    ///
    /// Returns `Ok(None)` when the callback failed with
    /// [`FleetError::Cancelled`] because a newer mutation was accepted. A
    /// shutdown-driven cancellation is surfaced.
    pub async fn run_selection_mutation<T, F, Fut>(
        &self,
        label: &str,
        callback: F,
    ) -> FleetResult<Option<T>>
    where
        F: FnOnce(MutationContext) -> Fut,
        Fut: Future<Output = FleetResult<T>>,
    {
        let mut assigned = 0;
        let result = self
            .mutate(label, |mutation| {
                assigned = mutation.generation();
                callback(mutation)
            })
            .await;

        match result {
            Ok(value) => Ok(Some(value)),
            Err(FleetError::Cancelled)
                if !self.root.is_cancelled() && !self.is_current(assigned) =>
            {
                tracing::debug!(label, generation = assigned, "superseded selection mutation finished");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel the outstanding mutation and every future one.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_each_mutation_increments_generation_by_one() {
        let sequencer = SelectionSequencer::new();
        assert_eq!(sequencer.current_generation(), 0);

        for expected in 1..=5u64 {
            let observed = sequencer
                .mutate("switch", |m| async move { Ok(m.generation()) })
                .await
                .unwrap();
            assert_eq!(observed, expected);
            assert_eq!(sequencer.current_generation(), expected);
        }
    }

    #[tokio::test]
    async fn test_callback_error_is_returned_unchanged() {
        let sequencer = SelectionSequencer::new();
        let err = sequencer
            .mutate("switch", |_| async {
                Err::<(), _>(FleetError::fetch("kubeconfig unreadable"))
            })
            .await
            .unwrap_err();
        assert_eq!(err, FleetError::fetch("kubeconfig unreadable"));
    }

    #[tokio::test]
    async fn test_callback_may_start_nested_mutation() {
        let sequencer = SelectionSequencer::new();
        let outer = &sequencer;

        let (outer_generation, inner_generation, outer_cancelled) = sequencer
            .mutate("outer", |m| async move {
                let inner = outer
                    .mutate("inner", |n| async move { Ok(n.generation()) })
                    .await?;
                Ok((m.generation(), inner, m.is_cancelled()))
            })
            .await
            .unwrap();

        assert_eq!(outer_generation, 1);
        assert_eq!(inner_generation, 2);
        assert!(outer_cancelled);
    }

    #[tokio::test]
    async fn test_overlapping_mutations_cancel_earlier() {
        let sequencer = Arc::new(SelectionSequencer::new());
        let (started_tx, started_rx) = oneshot::channel();

        let first = {
            let sequencer = Arc::clone(&sequencer);
            tokio::spawn(async move {
                sequencer
                    .run_selection_mutation("first", |m| async move {
                        let _ = started_tx.send(m.generation());
                        m.context()
                            .run(std::future::pending::<FleetResult<u64>>())
                            .await
                    })
                    .await
            })
        };
        let first_generation = started_rx.await.unwrap();

        let second_generation = sequencer
            .run_selection_mutation("second", |m| async move { Ok(m.generation()) })
            .await
            .unwrap()
            .unwrap();

        assert!(second_generation > first_generation);
        assert_eq!(first.await.unwrap(), Ok(None));
    }

    #[tokio::test]
    async fn test_shutdown_cancellation_is_surfaced() {
        let sequencer = Arc::new(SelectionSequencer::new());
        let (started_tx, started_rx) = oneshot::channel();

        let task = {
            let sequencer = Arc::clone(&sequencer);
            tokio::spawn(async move {
                sequencer
                    .run_selection_mutation("pending", |m| async move {
                        let _ = started_tx.send(());
                        m.context()
                            .run(std::future::pending::<FleetResult<()>>())
                            .await
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        sequencer.shutdown();
        assert!(sequencer.is_shut_down());
        assert_eq!(task.await.unwrap(), Err(FleetError::Cancelled));
    }

    #[tokio::test]
    async fn test_is_current_tracks_latest_generation() {
        let sequencer = SelectionSequencer::new();
        let generation = sequencer
            .mutate("a", |m| async move { Ok(m.generation()) })
            .await
            .unwrap();
        assert!(sequencer.is_current(generation));

        sequencer
            .mutate("b", |_| async { Ok(()) })
            .await
            .unwrap();
        assert!(!sequencer.is_current(generation));
    }
}

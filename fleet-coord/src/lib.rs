//! FLEET Coordination
//!
//! Concurrency boundaries underneath every cluster-bound action:
//!
//! - [`ScopedCoordinator`]: at most one live operation per scope. Starting a
//!   new operation on a scope cancels the previous one without waiting for it.
//!   Different scopes never interfere.
//! - [`SelectionSequencer`]: a process-wide, generation-stamped boundary for
//!   changes to the active selection. Each accepted mutation cancels the one
//!   before it, so concurrent triggers collapse onto the latest generation.
//! - [`ScopeTokens`]: one cancellation token per scope, revoked when the scope
//!   is deselected so its in-flight reads stop.
//!
//! None of them holds a lock while caller-supplied work runs. The critical
//! sections cover only the slot/map update itself.

pub mod coordinator;
pub mod scope_tokens;
pub mod sequencer;

pub use coordinator::ScopedCoordinator;
pub use scope_tokens::ScopeTokens;
pub use sequencer::{MutationContext, SelectionSequencer};

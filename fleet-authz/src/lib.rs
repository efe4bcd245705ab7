//! FLEET Authorization - Capability Batch Evaluation
//!
//! Answers ordered batches of "can I do X" questions for one scope. Unlike
//! the cache guard, evaluation failures are reported per item instead of
//! being resolved toward availability.

pub mod evaluator;

pub use evaluator::{BatchReport, CapabilityEvaluator};

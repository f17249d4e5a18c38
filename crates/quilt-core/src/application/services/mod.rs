//! Application services - orchestrate use cases.
//!
//! `ApplyService` interprets fragments against a target tree through the
//! mutation primitives in [`primitives`] and reports what happened.

pub mod apply_service;
pub mod primitives;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use apply_service::{ApplyService, MAX_APPLY_DEPTH};
pub use primitives::TargetTree;
pub use report::{MutationOutcome, RunFailure, RunReport, SkipReason, TraceEntry};

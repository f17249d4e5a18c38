//! Outcomes of a run.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorCategory, QuiltError};

/// Why a mutation left the tree untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The content (or file) is already there.
    AlreadyPresent,
    /// The insertion anchor or scope does not occur in the file.
    AnchorNotFound,
    /// A substitution pattern matched nothing.
    NoMatch,
}

/// Result of a single mutation primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum MutationOutcome {
    Applied,
    Skipped(SkipReason),
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// One executed step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub step: String,
    #[serde(flatten)]
    pub outcome: MutationOutcome,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub id: Uuid,
    pub applied: usize,
    pub skipped: usize,
    /// Newly declared package names, in declaration order.
    pub dependencies_added: Vec<String>,
    /// Deferred actions drained after assembly.
    pub deferred_executed: usize,
    /// External commands run, rendered as command lines.
    pub commands: Vec<String>,
    /// Pre-order trace of executed steps.
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            applied: 0,
            skipped: 0,
            dependencies_added: Vec::new(),
            deferred_executed: 0,
            commands: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: impl Into<String>, outcome: MutationOutcome) {
        match outcome {
            MutationOutcome::Applied => self.applied += 1,
            MutationOutcome::Skipped(_) => self.skipped += 1,
        }
        self.trace.push(TraceEntry {
            step: step.into(),
            outcome,
        });
    }

    /// Steps of the trace, without outcomes.
    pub fn steps(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.step.as_str()).collect()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A run that did not finish cleanly.
///
/// `errors` holds the abort reason (if the fragment tree failed) followed by
/// every deferred action failure. `report` is what was done before that.
#[derive(Debug, Error)]
#[error("{} error(s) during run {}", .errors.len(), .report.id)]
pub struct RunFailure {
    pub errors: Vec<QuiltError>,
    pub report: RunReport,
}

impl RunFailure {
    pub fn new(errors: Vec<QuiltError>, report: RunReport) -> Self {
        Self { errors, report }
    }

    /// The first error: the abort reason, or the first deferred failure.
    pub fn primary(&self) -> Option<&QuiltError> {
        self.errors.first()
    }

    pub fn category(&self) -> ErrorCategory {
        self.primary()
            .map_or(ErrorCategory::Internal, QuiltError::category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_outcomes() {
        let mut report = RunReport::new();
        report.record("insert a", MutationOutcome::Applied);
        report.record("insert b", MutationOutcome::Skipped(SkipReason::AnchorNotFound));
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.steps(), vec!["insert a", "insert b"]);
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let entry = TraceEntry {
            step: "substitute Dockerfile".into(),
            outcome: MutationOutcome::Skipped(SkipReason::NoMatch),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"step":"substitute Dockerfile","outcome":"skipped","reason":"no-match"}"#
        );
    }

    #[test]
    fn empty_failure_is_internal() {
        let failure = RunFailure::new(vec![], RunReport::new());
        assert_eq!(failure.category(), ErrorCategory::Internal);
    }
}

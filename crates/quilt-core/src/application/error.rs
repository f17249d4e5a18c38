//! Application layer errors.
//!
//! These errors represent failures while resolving sources and mutating the
//! target tree. Malformed input (references, fragments, paths) is a
//! `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while applying a template.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// Fetching a remote source or switching to its ref failed.
    #[error("Template source unavailable: {reference}: {reason}")]
    SourceUnavailable { reference: String, reason: String },

    /// A path required for a mutation does not exist.
    #[error("Target missing: {path}")]
    TargetMissing { path: PathBuf },

    /// A non-overwriting create hit an existing path.
    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// A fragment file could not be read or parsed.
    #[error("Failed to load fragment {path}: {reason}")]
    FragmentLoad { path: PathBuf, reason: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// An external program exited unsuccessfully or could not be started.
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// A deferred action failed while draining the queue.
    #[error("Deferred action #{ordinal} ({label}) failed: {reason}")]
    DeferredActionFailed {
        ordinal: usize,
        label: String,
        reason: String,
    },

    /// Shared state could not be locked (poisoned lock in an adapter).
    #[error("Target tree lock poisoned")]
    LockPoisoned,
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::SourceUnavailable { reference, .. } => vec![
                format!("Could not fetch: {}", reference),
                "Check the URL, your network connection and credentials".into(),
                "Verify that the selected branch or tag exists".into(),
            ],
            Self::TargetMissing { path } => vec![
                format!("Expected file not found: {}", path.display()),
                "Run the template against a fully generated application tree".into(),
                "Or add a create-file action before this one".into(),
            ],
            Self::AlreadyExists { path } => vec![
                format!("File already exists: {}", path.display()),
                "Use mode = \"ensure\" to create the file only when absent".into(),
                "Use mode = \"overwrite\" to replace it (destructive)".into(),
            ],
            Self::FragmentLoad { path, .. } => vec![
                format!("Check the fragment file: {}", path.display()),
                "Every action needs a 'type' field".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::CommandFailed { command, .. } => vec![
                format!("Ensure '{}' is installed and in your PATH", command),
                "Check the command output above for details".into(),
            ],
            Self::DeferredActionFailed { .. } => vec![
                "The tree was fully assembled; only post-assembly steps failed".into(),
                "Fix the cause and re-run the failed step manually".into(),
            ],
            Self::LockPoisoned => vec!["Try again".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SourceUnavailable { .. } => ErrorCategory::Unavailable,
            Self::TargetMissing { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::FragmentLoad { .. } => ErrorCategory::Validation,
            Self::FilesystemError { .. } | Self::LockPoisoned => ErrorCategory::Internal,
            Self::CommandFailed { .. } | Self::DeferredActionFailed { .. } => {
                ErrorCategory::Internal
            }
        }
    }
}

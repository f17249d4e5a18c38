//! The error type returned across the `quilt-core` boundary.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Either a rule broken by input data or a failure while running against
/// a target tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuiltError {
    /// Malformed references, fragments, options or paths.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Application(#[from] ApplicationError),
}

impl QuiltError {
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
        }
    }

    /// Front ends turn this into an exit status.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
        }
    }

    /// Always `false`: nothing in the engine retries.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    /// A template source could not be fetched or read.
    Unavailable,
    Internal,
}

pub type QuiltResult<T> = Result<T, QuiltError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn source_unavailable_is_categorised_as_unavailable() {
        let err: QuiltError = ApplicationError::SourceUnavailable {
            reference: "https://example.invalid/repo.git".into(),
            reason: "network unreachable".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert!(!err.is_retryable());
    }

    #[test]
    fn already_exists_is_a_conflict() {
        let err: QuiltError = ApplicationError::AlreadyExists {
            path: PathBuf::from("app/models/current.rb"),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.suggestions().iter().any(|s| s.contains("ensure")));
    }

    #[test]
    fn domain_errors_keep_their_category() {
        let err: QuiltError = DomainError::InvalidOption("database".into()).into();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().starts_with("Domain error:"));
    }
}

//! Rule violations detected while parsing references, fragments and options.

use thiserror::Error;

/// Clone so failures can be gathered into a run report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid template reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    #[error("Path escapes the target root: {path}")]
    PathEscapesRoot { path: String },

    #[error("Invalid option '{0}': expected key=value")]
    InvalidOption(String),

    // A fragment deserialised without a field every action needs.
    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },
}

impl DomainError {
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidReference { .. } => vec![
                "Pass a local path or a git URL".into(),
                "Select a ref with '#<ref>' or '/tree/<ref>'".into(),
                "Example: quilt apply https://github.com/acme/templates.git#v2".into(),
            ],
            Self::InvalidFragment(msg) => vec![
                "Check the fragment file for typos in action fields".into(),
                format!("Details: {}", msg),
            ],
            Self::InvalidPattern { pattern, .. } => vec![
                format!("'{}' is not a valid regular expression", pattern),
                "Set regex = false to match the text literally".into(),
            ],
            Self::AbsolutePathNotAllowed { .. } | Self::PathEscapesRoot { .. } => vec![
                "Fragment paths must be relative to the target root".into(),
                "Remove leading '/' and any '..' segments".into(),
            ],
            Self::InvalidOption(_) => vec![
                "Options are passed as -o key=value".into(),
                "Example: quilt apply ./template -o database=postgresql".into(),
            ],
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingRequiredField { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Internal,
}

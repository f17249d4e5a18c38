//! Errors surfaced by the `quilt` binary and their exit codes.
//!
//! Core failures are wrapped rather than flattened so the original
//! suggestions and categories survive up to the terminal.

use std::error::Error;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use thiserror::Error;

use quilt_core::application::RunFailure;
use quilt_core::domain::DomainError;
use quilt_core::error::QuiltError;

pub use quilt_core::error::ErrorCategory as CoreCategory;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// A flag or option value that could not be interpreted.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The directory passed with `--target` is missing or not a directory.
    #[error("Target directory not found: {path}")]
    TargetNotFound { path: PathBuf },

    /// Another process holds the target's lock.
    #[error("Target is locked by another run: {path}")]
    TargetLocked { path: PathBuf },

    /// A configuration file could not be read, parsed, or written.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single error raised by `quilt-core` outside a run.
    #[error("{0}")]
    Core(#[from] QuiltError),

    /// A run that aborted or had failing deferred actions.
    #[error("Run failed with {} error(s)", .0.errors.len())]
    Run(#[from] RunFailure),

    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The confirmation prompt was declined.
    #[error("Operation cancelled")]
    Cancelled,

    /// SIGINT arrived during the run.
    #[error("Interrupted")]
    Interrupted,
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<DomainError> for CliError {
    fn from(err: DomainError) -> Self {
        CliError::Core(err.into())
    }
}

impl CliError {
    /// Hints printed under the error message.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { message, .. } => vec![
                format!("Check your input: {}", message),
                "Use --help for usage information".into(),
            ],

            Self::TargetNotFound { path } => vec![
                format!("'{}' is not an existing directory", path.display()),
                "Generate the application first, then apply templates to it".into(),
                "Pass the tree explicitly: quilt apply <REFERENCE> -C <DIR>".into(),
            ],

            Self::TargetLocked { path } => vec![
                "Wait for the other run to finish".into(),
                format!("Look for a hung quilt process holding {}", path.display()),
            ],

            Self::ConfigError { message, .. } => vec![
                format!("Configuration issue: {}", message),
                "Show the active file with 'quilt config path'".into(),
                "Use 'quilt init' to create a default config".into(),
            ],

            Self::Core(core_err) => core_err.suggestions(),

            Self::Run(failure) => failure
                .primary()
                .map(QuiltError::suggestions)
                .unwrap_or_default(),

            Self::IoError { message, .. } => vec![
                format!("I/O operation failed: {}", message),
                "Check file permissions".into(),
                "Ensure the parent directory exists".into(),
            ],

            Self::Cancelled => vec![
                "Operation was cancelled".into(),
                "No changes were made".into(),
            ],

            Self::Interrupted => vec![
                "Changes made before the interrupt were kept".into(),
                "Run the same command again to finish; applied steps are skipped".into(),
            ],
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::UserError,
            Self::TargetNotFound { .. } => ErrorCategory::NotFound,
            Self::TargetLocked { .. } => ErrorCategory::UserError,
            Self::ConfigError { .. } => ErrorCategory::Configuration,
            Self::Core(core) => from_core(core.category()),
            Self::Run(failure) => from_core(failure.category()),
            Self::IoError { .. } => ErrorCategory::Internal,
            Self::Cancelled => ErrorCategory::UserError,
            Self::Interrupted => ErrorCategory::Interrupted,
        }
    }

    /// Process exit status.
    ///
    /// | Category      | Code |
    /// |---------------|------|
    /// | User error    |  2   |
    /// | Not found     |  3   |
    /// | Configuration |  4   |
    /// | Internal      |  1   |
    /// | Interrupted   | 130  |
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::UserError => 2,
            ErrorCategory::NotFound => 3,
            ErrorCategory::Configuration => 4,
            ErrorCategory::Internal => 1,
            ErrorCategory::Interrupted => 130,
        }
    }

    /// Every error collected by a failed run; empty for other variants.
    fn collected(&self) -> Vec<String> {
        match self {
            Self::Run(failure) => failure.errors.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Terminal rendering with ANSI styling.
    pub fn format_colored(&self, verbose: bool) -> String {
        self.render(verbose, true)
    }

    /// Same layout as [`Self::format_colored`] without escape codes.
    pub fn format_plain(&self, verbose: bool) -> String {
        self.render(verbose, false)
    }

    fn render(&self, verbose: bool, color: bool) -> String {
        let paint = |text: String, style: fn(&str) -> String| if color { style(&text) } else { text };
        let mut out = String::new();

        if color {
            out.push_str(&format!("\n{} {}\n", "✗".red().bold(), "Error:".red().bold()));
            out.push_str(&format!("  {}\n", self.to_string().red()));
        } else {
            out.push_str(&format!("\nError: {self}\n"));
        }

        let bullet = if color { "•".red().to_string() } else { "-".to_string() };
        for err in self.collected() {
            out.push_str(&format!("  {bullet} {err}\n"));
        }

        if verbose {
            let mut cause = self.source();
            while let Some(err) = cause {
                out.push_str(&paint(format!("  Caused by: {err}\n"), |s| s.dimmed().to_string()));
                cause = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str(&paint("\nSuggestions:\n".into(), |s| s.yellow().bold().to_string()));
            for hint in &suggestions {
                out.push_str(&format!("  {hint}\n"));
            }
        }

        if !verbose {
            out.push_str(&paint(
                "\nUse -v / --verbose for more details.\n".into(),
                |s| s.dimmed().to_string(),
            ));
        }

        out
    }

    pub fn log(&self) {
        match self.category() {
            ErrorCategory::UserError => tracing::warn!("User error: {}", self),
            ErrorCategory::NotFound => tracing::warn!("Not found: {}", self),
            ErrorCategory::Configuration => tracing::error!("Configuration error: {}", self),
            ErrorCategory::Internal => tracing::error!("Internal error: {}", self),
            ErrorCategory::Interrupted => tracing::warn!("Run interrupted"),
        }

        if let Self::Run(failure) = self {
            for err in &failure.errors {
                tracing::debug!(run = %failure.report.id, "Collected: {}", err);
            }
        } else if let Some(source) = self.source() {
            tracing::debug!("Caused by: {}", source);
        }
    }
}

fn from_core(category: CoreCategory) -> ErrorCategory {
    match category {
        CoreCategory::Validation | CoreCategory::Conflict => ErrorCategory::UserError,
        CoreCategory::NotFound | CoreCategory::Unavailable => ErrorCategory::NotFound,
        CoreCategory::Internal => ErrorCategory::Internal,
    }
}

/// Coarse grouping that drives the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UserError,
    NotFound,
    Configuration,
    Internal,
    Interrupted,
}

/// Attaches a human message to an I/O failure.
pub trait IntoCli<T> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IntoCli<T> for Result<T, std::io::Error> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| CliError::IoError {
            message: f().into(),
            source: e,
        })
    }
}

//! Resolves template references to readable roots.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use quilt_core::{
    application::{ApplicationError, ports::SourceResolver},
    domain::{DEFAULT_ENTRY, ResolvedSource, TemplateReference},
    error::QuiltResult,
};

use super::git::{GitCommand, GitError};
use crate::interrupt::Interrupt;

/// Resolves local paths in place and remote URLs into a temporary checkout.
///
/// The checkout directory is handed back as the source's lease and removed
/// when the source is dropped.
#[derive(Debug, Clone)]
pub struct GitSourceResolver {
    git_program: String,
    interrupt: Interrupt,
}

impl GitSourceResolver {
    pub fn new() -> Self {
        Self {
            git_program: "git".into(),
            interrupt: Interrupt::new(),
        }
    }

    /// Abandon a fetch in progress once `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: &Interrupt) -> Self {
        self.interrupt = interrupt.clone();
        self
    }

    /// Use a different git executable.
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }

    fn resolve_local(&self, reference: &TemplateReference) -> QuiltResult<ResolvedSource> {
        let location = Path::new(reference.location());

        let source = if location.is_file() {
            let root = match location.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let entry = location.file_name().unwrap_or_default();
            ResolvedSource::new(root, entry)
        } else if location.is_dir() {
            ResolvedSource::new(location, reference.entry().unwrap_or(DEFAULT_ENTRY))
        } else {
            return Err(unavailable(reference, "path does not exist"));
        };

        ensure_entry(reference, source)
    }

    fn resolve_remote(&self, reference: &TemplateReference) -> QuiltResult<ResolvedSource> {
        let url = reference.location();
        let lease = tempfile::Builder::new()
            .prefix("quilt-")
            .tempdir()
            .map_err(|e| unavailable(reference, &format!("cannot create checkout directory: {e}")))?;

        info!(url, git_ref = reference.git_ref(), "Fetching template source");
        let checkout = self
            .fetch(url, reference.git_ref(), &lease)
            .map_err(|e| unavailable(reference, &e.to_string()))?;

        let source = ResolvedSource::new(checkout, reference.entry().unwrap_or(DEFAULT_ENTRY))
            .with_lease(lease);
        ensure_entry(reference, source)
    }

    /// Shallow clone first. A ref that is not a branch or tag (a commit id)
    /// cannot be shallow-cloned, so fall back to a full clone and checkout.
    fn fetch(&self, url: &str, git_ref: Option<&str>, lease: &TempDir) -> Result<PathBuf, GitError> {
        let shallow = lease.path().join("shallow");
        let first = GitCommand::shallow_clone(&self.git_program, url, git_ref, &shallow)
            .with_context(url)
            .interruptible(&self.interrupt)
            .execute();

        let err = match first {
            Ok(_) => return Ok(shallow),
            Err(err @ (GitError::NotInstalled { .. } | GitError::Interrupted { .. })) => {
                return Err(err);
            }
            Err(err) => err,
        };
        let Some(git_ref) = git_ref else {
            return Err(err);
        };

        debug!(url, git_ref, "Shallow clone failed, retrying with full clone: {err}");
        let full = lease.path().join("full");
        GitCommand::full_clone(&self.git_program, url, &full)
            .with_context(url)
            .interruptible(&self.interrupt)
            .execute()?;
        GitCommand::checkout(&self.git_program, git_ref)
            .current_dir(&full)
            .with_context(url)
            .interruptible(&self.interrupt)
            .execute()?;
        Ok(full)
    }
}

impl Default for GitSourceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceResolver for GitSourceResolver {
    #[instrument(skip_all, fields(reference = %reference))]
    fn resolve(&self, reference: &TemplateReference) -> QuiltResult<ResolvedSource> {
        if reference.is_remote() {
            self.resolve_remote(reference)
        } else {
            self.resolve_local(reference)
        }
    }
}

fn ensure_entry(reference: &TemplateReference, source: ResolvedSource) -> QuiltResult<ResolvedSource> {
    if source.entry_path().is_file() {
        return Ok(source);
    }
    warn!(entry = %source.entry().display(), "Entry fragment not found in source");
    Err(unavailable(
        reference,
        &format!("entry fragment '{}' not found", source.entry().display()),
    ))
}

fn unavailable(reference: &TemplateReference, reason: &str) -> quilt_core::error::QuiltError {
    ApplicationError::SourceUnavailable {
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

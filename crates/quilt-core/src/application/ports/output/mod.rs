//! Traits the interpreter drives.
//!
//! These traits define what the application needs from external systems.
//! The `quilt-adapters` crate provides implementations.

use std::path::{Path, PathBuf};

use crate::domain::{Fragment, ResolvedSource, TemplateReference};
use crate::error::QuiltResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `quilt_adapters::filesystem::LocalFilesystem` (production)
/// - `quilt_adapters::filesystem::MemoryFilesystem` (overlay write layer)
/// - `quilt_adapters::filesystem::OverlayFilesystem` (dry runs)
///
/// ## Design Notes
///
/// - Paths are absolute: the interpreter joins target-relative paths onto
///   the target root and source-relative paths onto the source root
/// - Reading a missing file is `ApplicationError::TargetMissing`
/// - Writes do not create parent directories; callers do
pub trait Filesystem: Send + Sync {
    /// Read a UTF-8 text file.
    fn read_to_string(&self, path: &Path) -> QuiltResult<String>;

    /// Read a file byte-for-byte.
    fn read_bytes(&self, path: &Path) -> QuiltResult<Vec<u8>>;

    /// Create or replace a text file.
    fn write_file(&self, path: &Path, content: &str) -> QuiltResult<()>;

    /// Create or replace a file byte-for-byte.
    fn write_bytes(&self, path: &Path, content: &[u8]) -> QuiltResult<()>;

    /// Append to an existing file.
    fn append_file(&self, path: &Path, content: &str) -> QuiltResult<()>;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> QuiltResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Every file below `dir`, recursively, relative to `dir`, sorted.
    fn list_files(&self, dir: &Path) -> QuiltResult<Vec<PathBuf>>;
}

/// Port for turning a template reference into a readable root.
///
/// Implemented by:
/// - `quilt_adapters::source::GitSourceResolver` (local paths and git remotes)
#[cfg_attr(test, mockall::automock)]
pub trait SourceResolver: Send + Sync {
    /// Resolve `reference`.
    ///
    /// Remote references are fetched into an ephemeral directory whose
    /// release is tied to the returned value's lifetime. Every failure is
    /// `ApplicationError::SourceUnavailable`.
    fn resolve(&self, reference: &TemplateReference) -> QuiltResult<ResolvedSource>;
}

/// Port for reading fragment files.
///
/// Implemented by:
/// - `quilt_adapters::fragment_loader::TomlFragmentLoader`
pub trait FragmentLoader: Send + Sync {
    /// Load and parse the fragment at `path`.
    fn load(&self, path: &Path) -> QuiltResult<Fragment>;
}

/// Port for running external programs.
///
/// Implemented by:
/// - `quilt_adapters::command_runner::ProcessCommandRunner`
/// - `quilt_adapters::command_runner::DryRunCommandRunner`
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`; non-zero exit is
    /// `ApplicationError::CommandFailed`.
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> QuiltResult<()>;
}

//! Mutation primitives over the target tree.
//!
//! Each primitive re-reads the file it edits, so anchors always see the
//! result of every earlier mutation. Insertions are idempotent by checking
//! for their own content first; missing anchors are no-ops.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::ApplicationError;
use crate::application::ports::Filesystem;
use crate::domain::anchor::{self, Anchor, Position, ScopeKind};
use crate::domain::{CreateMode, RelativePath};
use crate::error::QuiltResult;

use super::report::{MutationOutcome, SkipReason};

/// The target tree of one run, seen through a filesystem port.
pub struct TargetTree<'a> {
    fs: &'a dyn Filesystem,
    root: &'a Path,
}

impl<'a> TargetTree<'a> {
    pub fn new(fs: &'a dyn Filesystem, root: &'a Path) -> Self {
        Self { fs, root }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    pub fn path(&self, relative: &RelativePath) -> PathBuf {
        relative.under(self.root)
    }

    pub fn exists(&self, relative: &RelativePath) -> bool {
        self.fs.exists(&self.path(relative))
    }

    /// Read a file that a mutation requires.
    pub fn read(&self, relative: &RelativePath) -> QuiltResult<String> {
        let path = self.require(relative)?;
        self.fs.read_to_string(&path)
    }

    fn require(&self, relative: &RelativePath) -> QuiltResult<PathBuf> {
        let path = self.path(relative);
        if !self.fs.is_file(&path) {
            return Err(ApplicationError::TargetMissing { path }.into());
        }
        Ok(path)
    }

    fn prepare_create(&self, relative: &RelativePath, mode: CreateMode) -> QuiltResult<Option<PathBuf>> {
        let path = self.path(relative);
        if self.fs.exists(&path) {
            match mode {
                CreateMode::Create => return Err(ApplicationError::AlreadyExists { path }.into()),
                CreateMode::Ensure => {
                    debug!(path = %relative, "file exists, leaving it");
                    return Ok(None);
                }
                CreateMode::Overwrite => {}
            }
        }
        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        Ok(Some(path))
    }

    /// Create a file. See [`CreateMode`] for existing destinations.
    pub fn create_file(
        &self,
        relative: &RelativePath,
        content: &str,
        mode: CreateMode,
    ) -> QuiltResult<MutationOutcome> {
        match self.prepare_create(relative, mode)? {
            Some(path) => {
                self.fs.write_file(&path, content)?;
                Ok(MutationOutcome::Applied)
            }
            None => Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent)),
        }
    }

    /// Append unconditionally; the file must exist.
    pub fn append_file(&self, relative: &RelativePath, content: &str) -> QuiltResult<MutationOutcome> {
        let path = self.require(relative)?;
        self.fs.append_file(&path, content)?;
        Ok(MutationOutcome::Applied)
    }

    /// Insert next to the first match of `anchor`.
    pub fn insert_relative(
        &self,
        relative: &RelativePath,
        anchor: &Anchor,
        position: Position,
        content: &str,
    ) -> QuiltResult<MutationOutcome> {
        let current = self.read(relative)?;
        if anchor::already_present(&current, content) {
            debug!(path = %relative, "content already present");
            return Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent));
        }
        match anchor::insert_relative(&current, anchor, position, content) {
            Some(updated) => {
                self.fs.write_file(&self.path(relative), &updated)?;
                Ok(MutationOutcome::Applied)
            }
            None => {
                debug!(path = %relative, "anchor not found, skipping");
                Ok(MutationOutcome::Skipped(SkipReason::AnchorNotFound))
            }
        }
    }

    /// Replace every match of `anchor`.
    pub fn substitute(
        &self,
        relative: &RelativePath,
        anchor: &Anchor,
        replacement: &str,
    ) -> QuiltResult<MutationOutcome> {
        let current = self.read(relative)?;
        match anchor::substitute(&current, anchor, replacement) {
            Some(updated) if updated == current => {
                Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent))
            }
            Some(updated) => {
                self.fs.write_file(&self.path(relative), &updated)?;
                Ok(MutationOutcome::Applied)
            }
            None => {
                debug!(path = %relative, "pattern matched nothing");
                Ok(MutationOutcome::Skipped(SkipReason::NoMatch))
            }
        }
    }

    /// Insert into the body of a named class or module.
    pub fn inject_scope(
        &self,
        relative: &RelativePath,
        scope: &str,
        kind: ScopeKind,
        content: &str,
    ) -> QuiltResult<MutationOutcome> {
        let current = self.read(relative)?;
        let Some(indent) = anchor::scope_indent(&current, scope, kind) else {
            debug!(path = %relative, scope, "scope not found, skipping");
            return Ok(MutationOutcome::Skipped(SkipReason::AnchorNotFound));
        };
        if anchor::already_present(&current, &anchor::scope_body(&indent, content)) {
            return Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent));
        }
        match anchor::inject_scope(&current, scope, kind, content) {
            Some(updated) => {
                self.fs.write_file(&self.path(relative), &updated)?;
                Ok(MutationOutcome::Applied)
            }
            None => Ok(MutationOutcome::Skipped(SkipReason::AnchorNotFound)),
        }
    }

    /// Copy a file byte-for-byte from an absolute source path.
    pub fn copy_verbatim(
        &self,
        source: &Path,
        destination: &RelativePath,
        mode: CreateMode,
    ) -> QuiltResult<MutationOutcome> {
        if !self.fs.is_file(source) {
            return Err(ApplicationError::TargetMissing {
                path: source.to_path_buf(),
            }
            .into());
        }
        match self.prepare_create(destination, mode)? {
            Some(path) => {
                let bytes = self.fs.read_bytes(source)?;
                self.fs.write_bytes(&path, &bytes)?;
                Ok(MutationOutcome::Applied)
            }
            None => Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent)),
        }
    }

    /// Copy every file below `source` into `destination`.
    ///
    /// Returns one `(destination file, outcome)` pair per file, sorted.
    pub fn copy_directory(
        &self,
        source: &Path,
        destination: &RelativePath,
        mode: CreateMode,
    ) -> QuiltResult<Vec<(RelativePath, MutationOutcome)>> {
        if !self.fs.exists(source) || self.fs.is_file(source) {
            return Err(ApplicationError::TargetMissing {
                path: source.to_path_buf(),
            }
            .into());
        }
        self.fs
            .list_files(source)?
            .into_iter()
            .map(|file| -> QuiltResult<(RelativePath, MutationOutcome)> {
                let dest = destination.join(&file)?;
                let outcome = self.copy_verbatim(&source.join(&file), &dest, mode)?;
                Ok((dest, outcome))
            })
            .collect()
    }
}

//! Copy-on-write overlay used for dry runs.
//!
//! Reads fall through to the base filesystem until a path is written; writes
//! land in an in-memory layer and never reach the base.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use quilt_core::{
    application::{ApplicationError, ports::Filesystem},
    error::QuiltResult,
};

use super::MemoryFilesystem;

/// What a dry run would have done to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// A filesystem that records writes in memory on top of a read-only base.
#[derive(Clone)]
pub struct OverlayFilesystem {
    base: Arc<dyn Filesystem>,
    upper: MemoryFilesystem,
    touched: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl OverlayFilesystem {
    pub fn new(base: Arc<dyn Filesystem>) -> Self {
        Self {
            base,
            upper: MemoryFilesystem::new(),
            touched: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    /// Every written path with whether it is new or changed, sorted.
    pub fn changes(&self) -> Vec<(PathBuf, ChangeKind)> {
        let touched = match self.touched.read() {
            Ok(touched) => touched.clone(),
            Err(_) => return Vec::new(),
        };
        touched
            .into_iter()
            .filter(|path| self.upper.is_file(path))
            .map(|path| {
                let kind = if self.base.is_file(&path) {
                    ChangeKind::Modified
                } else {
                    ChangeKind::Created
                };
                (path, kind)
            })
            .collect()
    }

    fn touch(&self, path: &Path) -> QuiltResult<()> {
        self.touched
            .write()
            .map_err(|_| ApplicationError::LockPoisoned)?
            .insert(path.to_path_buf());
        Ok(())
    }

    fn ensure_parent(&self, path: &Path) -> QuiltResult<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.upper.create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for OverlayFilesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFilesystem")
            .field("upper", &self.upper)
            .finish_non_exhaustive()
    }
}

impl Filesystem for OverlayFilesystem {
    fn read_to_string(&self, path: &Path) -> QuiltResult<String> {
        if self.upper.is_file(path) {
            self.upper.read_to_string(path)
        } else {
            self.base.read_to_string(path)
        }
    }

    fn read_bytes(&self, path: &Path) -> QuiltResult<Vec<u8>> {
        if self.upper.is_file(path) {
            self.upper.read_bytes(path)
        } else {
            self.base.read_bytes(path)
        }
    }

    fn write_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        self.write_bytes(path, content.as_bytes())
    }

    fn write_bytes(&self, path: &Path, content: &[u8]) -> QuiltResult<()> {
        self.ensure_parent(path)?;
        self.upper.write_bytes(path, content)?;
        self.touch(path)
    }

    fn append_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        if !self.upper.is_file(path) {
            let existing = self.base.read_bytes(path)?;
            self.ensure_parent(path)?;
            self.upper.write_bytes(path, &existing)?;
        }
        self.upper.append_file(path, content)?;
        self.touch(path)
    }

    fn create_dir_all(&self, path: &Path) -> QuiltResult<()> {
        self.upper.create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.upper.exists(path) || self.base.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.upper.is_file(path) || self.base.is_file(path)
    }

    fn list_files(&self, dir: &Path) -> QuiltResult<Vec<PathBuf>> {
        let mut files: BTreeSet<PathBuf> = if self.base.exists(dir) {
            self.base.list_files(dir)?.into_iter().collect()
        } else {
            BTreeSet::new()
        };
        files.extend(self.upper.list_files(dir)?);
        Ok(files.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<dyn Filesystem> {
        Arc::new(MemoryFilesystem::new().with_file("/app/Gemfile", "gem \"rails\"\n"))
    }

    #[test]
    fn writes_never_reach_the_base() {
        let base = base();
        let overlay = OverlayFilesystem::new(base.clone());
        overlay
            .append_file(Path::new("/app/Gemfile"), "gem \"ulid\"\n")
            .unwrap();
        overlay
            .write_file(Path::new("/app/lib/util.rb"), "module Util\nend\n")
            .unwrap();

        assert_eq!(
            overlay.read_to_string(Path::new("/app/Gemfile")).ok().as_deref(),
            Some("gem \"rails\"\ngem \"ulid\"\n")
        );
        assert_eq!(
            base.read_to_string(Path::new("/app/Gemfile")).unwrap(),
            "gem \"rails\"\n"
        );
        assert!(!base.exists(Path::new("/app/lib/util.rb")));
    }

    #[test]
    fn changes_distinguish_created_and_modified() {
        let overlay = OverlayFilesystem::new(base());
        overlay.append_file(Path::new("/app/Gemfile"), "x").unwrap();
        overlay.write_file(Path::new("/app/new.rb"), "").unwrap();

        assert_eq!(
            overlay.changes(),
            vec![
                (PathBuf::from("/app/Gemfile"), ChangeKind::Modified),
                (PathBuf::from("/app/new.rb"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn append_to_missing_file_fails() {
        let overlay = OverlayFilesystem::new(base());
        assert!(overlay.append_file(Path::new("/app/nope"), "x").is_err());
    }
}

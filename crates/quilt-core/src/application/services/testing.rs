//! In-crate test doubles for the filesystem and loader ports.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::application::ApplicationError;
use crate::application::ports::{Filesystem, FragmentLoader, SourceResolver};
use crate::domain::{DEFAULT_ENTRY, Fragment, ResolvedSource, TemplateReference};
use crate::error::QuiltResult;

/// Map-backed filesystem. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    failing_appends: BTreeSet<PathBuf>,
}

impl MemFs {
    pub fn put(&self, path: impl AsRef<Path>, content: &str) {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(path.as_ref().to_path_buf(), content.as_bytes().to_vec());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .files
            .get(path.as_ref())
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// The next append to `path` fails; later ones succeed.
    pub fn fail_next_append(&self, path: impl AsRef<Path>) {
        self.inner
            .lock()
            .unwrap()
            .failing_appends
            .insert(path.as_ref().to_path_buf());
    }

    pub fn file_count(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }

    fn missing(path: &Path) -> ApplicationError {
        ApplicationError::TargetMissing {
            path: path.to_path_buf(),
        }
    }
}

impl Filesystem for MemFs {
    fn read_to_string(&self, path: &Path) -> QuiltResult<String> {
        self.get(path).ok_or_else(|| Self::missing(path).into())
    }

    fn read_bytes(&self, path: &Path) -> QuiltResult<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::missing(path).into())
    }

    fn write_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        self.write_bytes(path, content.as_bytes())
    }

    fn write_bytes(&self, path: &Path, content: &[u8]) -> QuiltResult<()> {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn append_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_appends.remove(path) {
            return Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            }
            .into());
        }
        let file = inner.files.get_mut(path).ok_or_else(|| Self::missing(path))?;
        file.extend_from_slice(content.as_bytes());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> QuiltResult<()> {
        self.inner.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.files.contains_key(path)
            || inner.dirs.contains(path)
            || inner.files.keys().any(|f| f.starts_with(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().files.contains_key(path)
    }

    fn list_files(&self, dir: &Path) -> QuiltResult<Vec<PathBuf>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .files
            .keys()
            .filter_map(|f| f.strip_prefix(dir).ok())
            .filter(|f| !f.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect())
    }
}

/// Loader serving pre-built fragments by path.
#[derive(Debug, Default)]
pub struct MapLoader {
    fragments: HashMap<PathBuf, Fragment>,
}

impl MapLoader {
    pub fn with(mut self, path: impl Into<PathBuf>, fragment: Fragment) -> Self {
        self.fragments.insert(path.into(), fragment);
        self
    }
}

impl FragmentLoader for MapLoader {
    fn load(&self, path: &Path) -> QuiltResult<Fragment> {
        self.fragments.get(path).cloned().ok_or_else(|| {
            ApplicationError::FragmentLoad {
                path: path.to_path_buf(),
                reason: "no such fragment".into(),
            }
            .into()
        })
    }
}

/// Resolves local references the way the on-disk resolver does, without
/// touching the disk: a `.toml` location is an entry file, anything else a
/// directory holding the default entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirResolver;

impl SourceResolver for DirResolver {
    fn resolve(&self, reference: &TemplateReference) -> QuiltResult<ResolvedSource> {
        let location = Path::new(reference.location());
        if location.extension().is_some_and(|e| e == "toml") {
            let root = location.parent().unwrap_or(Path::new("/"));
            let entry = location.file_name().unwrap_or_default();
            return Ok(ResolvedSource::new(root, entry));
        }
        Ok(ResolvedSource::new(
            location,
            reference.entry().unwrap_or(DEFAULT_ENTRY),
        ))
    }
}

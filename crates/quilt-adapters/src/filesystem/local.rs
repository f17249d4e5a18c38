//! Local filesystem adapter using std::fs.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use quilt_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{QuiltError, QuiltResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn read_to_string(&self, path: &Path) -> QuiltResult<String> {
        std::fs::read_to_string(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn read_bytes(&self, path: &Path) -> QuiltResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn write_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn write_bytes(&self, path: &Path, content: &[u8]) -> QuiltResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn append_file(&self, path: &Path, content: &str) -> QuiltResult<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| map_io_error(path, e, "open file for append"))?;
        file.write_all(content.as_bytes())
            .map_err(|e| map_io_error(path, e, "append to file"))
    }

    fn create_dir_all(&self, path: &Path) -> QuiltResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_files(&self, dir: &Path) -> QuiltResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| ApplicationError::FilesystemError {
                path: dir.to_path_buf(),
                reason: format!("Failed to walk directory: {e}"),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> QuiltError {
    if e.kind() == io::ErrorKind::NotFound {
        return ApplicationError::TargetMissing {
            path: path.to_path_buf(),
        }
        .into();
    }
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_extends_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Gemfile");
        std::fs::write(&path, "gem \"rails\"\n").unwrap();

        let fs = LocalFilesystem::new();
        fs.append_file(&path, "gem \"ulid\"\n").unwrap();
        assert_eq!(
            fs.read_to_string(&path).unwrap(),
            "gem \"rails\"\ngem \"ulid\"\n"
        );
    }

    #[test]
    fn append_to_missing_file_is_target_missing() {
        let dir = TempDir::new().unwrap();
        let err = LocalFilesystem::new()
            .append_file(&dir.path().join("nope"), "x")
            .unwrap_err();
        assert!(matches!(
            err,
            QuiltError::Application(ApplicationError::TargetMissing { .. })
        ));
    }

    #[test]
    fn list_files_is_recursive_relative_and_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("b/c/z.yml"), "").unwrap();
        std::fs::write(dir.path().join("a.yml"), "").unwrap();

        let files = LocalFilesystem::new().list_files(dir.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.yml"), PathBuf::from("b/c/z.yml")]);
    }

    #[test]
    fn bytes_round_trip_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        let bytes = [0x89, b'P', b'N', b'G', 0x00, 0xff];

        let fs = LocalFilesystem::new();
        fs.write_bytes(&path, &bytes).unwrap();
        assert_eq!(fs.read_bytes(&path).unwrap(), bytes);
        assert!(fs.is_file(&path));
        assert!(!fs.is_file(dir.path()));
    }
}

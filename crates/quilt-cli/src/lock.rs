//! Exclusive ownership of a target tree for the duration of a run.
//!
//! The lock is an OS-level exclusive lock on `.quilt.lock` at the target
//! root. The kernel drops it when the holding process exits, so a file left
//! behind by a crashed run does not block the next one.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

/// Lock file name, created at the target root.
pub const LOCK_FILE: &str = ".quilt.lock";

/// A held target lock, released and its file removed on drop.
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Lock the target, failing if another process holds it.
    pub fn acquire(target: &Path) -> CliResult<Self> {
        let path = target.join(LOCK_FILE);
        let io_error = |source| CliError::IoError {
            message: format!("Failed to open lock file {}", path.display()),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) => return Err(CliError::TargetLocked { path }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Lock attempt failed");
                return Err(CliError::TargetLocked { path });
            }
        }

        // The pid is informational only.
        if let Err(e) = file.set_len(0).and_then(|()| writeln!(file, "{}", std::process::id())) {
            warn!(path = %path.display(), error = %e, "Failed to record pid in lock file");
        }
        debug!(path = %path.display(), "Target lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        // Remove while still holding the lock so no waiter locks a dead inode.
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release target lock");
        }
        debug!(path = %self.path.display(), "Target lock released");
    }
}

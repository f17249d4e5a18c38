//! TOML fragment loading.

use std::path::Path;

use tracing::debug;

use quilt_core::{
    application::{ApplicationError, ports::FragmentLoader},
    domain::Fragment,
    error::QuiltResult,
};

/// Reads fragment files written in TOML.
///
/// Parsing and structural validation both happen here, so a malformed
/// fragment is rejected before any of its actions run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFragmentLoader;

impl TomlFragmentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse fragment text. `path` is only used in error messages.
    pub fn parse(&self, path: &Path, text: &str) -> QuiltResult<Fragment> {
        let fragment: Fragment = toml::from_str(text).map_err(|e| ApplicationError::FragmentLoad {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        fragment.validate()?;
        Ok(fragment)
    }
}

impl FragmentLoader for TomlFragmentLoader {
    fn load(&self, path: &Path) -> QuiltResult<Fragment> {
        debug!(path = %path.display(), "Loading fragment");
        let text = std::fs::read_to_string(path).map_err(|e| ApplicationError::FragmentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.parse(path, &text)
    }
}

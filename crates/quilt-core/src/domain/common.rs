use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::DomainError;

/// A target-tree path guaranteed to be relative and to stay inside the root.
///
/// Invariant: never absolute, never climbs above the root. Enforced at
/// construction; `.` segments are dropped and `..` segments are folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Fallible constructor.
    pub fn try_new(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if path.has_root() || path.is_absolute() {
            return Err(DomainError::AbsolutePathNotAllowed { path: display });
        }

        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::PathEscapesRoot { path: display });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(DomainError::AbsolutePathNotAllowed { path: display });
                }
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(DomainError::MissingRequiredField { field: "path" });
        }

        Ok(Self(normalized))
    }

    /// Join a segment, maintaining the relative invariant.
    pub fn join(&self, segment: impl AsRef<Path>) -> Result<Self, DomainError> {
        Self::try_new(self.0.join(segment))
    }

    /// Resolve against a root directory.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_relative_paths() {
        let path = RelativePath::try_new("config/routes.rb").unwrap();
        assert_eq!(path.as_path(), Path::new("config/routes.rb"));
    }

    #[test]
    fn folds_current_and_parent_segments() {
        let path = RelativePath::try_new("./app/../config/./routes.rb").unwrap();
        assert_eq!(path.as_path(), Path::new("config/routes.rb"));
    }

    #[test]
    fn rejects_absolute_paths() {
        assert!(matches!(
            RelativePath::try_new("/etc/passwd"),
            Err(DomainError::AbsolutePathNotAllowed { .. })
        ));
    }

    #[test]
    fn rejects_escaping_the_root() {
        assert!(matches!(
            RelativePath::try_new("../outside.rb"),
            Err(DomainError::PathEscapesRoot { .. })
        ));
        assert!(matches!(
            RelativePath::try_new("app/../../outside.rb"),
            Err(DomainError::PathEscapesRoot { .. })
        ));
    }

    #[test]
    fn rejects_empty_paths() {
        assert!(RelativePath::try_new("").is_err());
        assert!(RelativePath::try_new(".").is_err());
    }

    #[test]
    fn join_keeps_invariant() {
        let base = RelativePath::try_new("config").unwrap();
        assert_eq!(
            base.join("initializers/a.rb").unwrap().as_path(),
            Path::new("config/initializers/a.rb")
        );
        assert!(base.join("../../x").is_err());
    }
}

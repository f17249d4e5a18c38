//! Template references and resolved sources.
//!
//! A [`TemplateReference`] names where a fragment comes from: a local path or
//! a remote git repository with an optional ref. Resolving it (see the
//! `SourceResolver` port) yields a [`ResolvedSource`], a filesystem root that
//! fragment files and verbatim copies are read from.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DomainError;

/// Default entry fragment looked up in a source root.
pub const DEFAULT_ENTRY: &str = "template.toml";

const REMOTE_PREFIXES: &[&str] = &[
    "http://", "https://", "ssh://", "git://", "file://", "git@",
];

/// Where a reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    LocalPath,
    RemoteUrl,
}

/// A parsed template reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateReference {
    kind: ReferenceKind,
    location: String,
    git_ref: Option<String>,
    entry: Option<String>,
}

impl TemplateReference {
    /// Parse a user- or fragment-supplied reference string.
    ///
    /// Remote references may select a ref with a trailing `#<ref>` or a
    /// `/tree/<ref>` path segment.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid(raw, "reference is empty"));
        }

        if !is_remote(raw) {
            return Ok(Self::local(raw));
        }

        if let Some((url, git_ref)) = raw.rsplit_once('#') {
            if git_ref.is_empty() {
                return Err(invalid(raw, "empty ref after '#'"));
            }
            return Ok(Self::remote(url, Some(git_ref.to_string())));
        }

        if let Some(idx) = raw.find("/tree/") {
            let (url, rest) = raw.split_at(idx);
            let git_ref = rest["/tree/".len()..].trim_end_matches('/');
            if git_ref.is_empty() {
                return Err(invalid(raw, "empty ref after '/tree/'"));
            }
            return Ok(Self::remote(url, Some(git_ref.to_string())));
        }

        Ok(Self::remote(raw, None))
    }

    /// A local-path reference.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::LocalPath,
            location: path.into(),
            git_ref: None,
            entry: None,
        }
    }

    /// A remote-url reference.
    pub fn remote(url: impl Into<String>, git_ref: Option<String>) -> Self {
        Self {
            kind: ReferenceKind::RemoteUrl,
            location: url.into(),
            git_ref,
            entry: None,
        }
    }

    /// Override the entry fragment file inside the resolved root.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Re-anchor a relative local reference at `root`.
    ///
    /// Used for nested `apply` actions, whose relative sources are relative
    /// to the fragment that contains them. Remote and absolute references are
    /// returned unchanged.
    pub fn relative_to(self, root: &Path) -> Self {
        if self.kind == ReferenceKind::LocalPath && Path::new(&self.location).is_relative() {
            let joined = root.join(&self.location);
            Self {
                location: joined.to_string_lossy().into_owned(),
                ..self
            }
        } else {
            self
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        self.kind == ReferenceKind::RemoteUrl
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.git_ref.as_deref()
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }
}

impl fmt::Display for TemplateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)?;
        if let Some(git_ref) = &self.git_ref {
            write!(f, "#{git_ref}")?;
        }
        Ok(())
    }
}

fn is_remote(raw: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| raw.starts_with(p)) || raw.ends_with(".git")
}

fn invalid(raw: &str, reason: &str) -> DomainError {
    DomainError::InvalidReference {
        reference: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// A reference resolved to a readable filesystem root.
///
/// `lease` keeps an ephemeral checkout alive; dropping the `ResolvedSource`
/// releases it. Local sources carry no lease.
pub struct ResolvedSource {
    root: PathBuf,
    entry: PathBuf,
    lease: Option<Box<dyn Any + Send>>,
}

impl ResolvedSource {
    pub fn new(root: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entry: entry.into(),
            lease: None,
        }
    }

    /// Attach a guard whose drop releases the root.
    pub fn with_lease(mut self, lease: impl Any + Send) -> Self {
        self.lease = Some(Box::new(lease));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry fragment path, relative to [`Self::root`].
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.lease.is_some()
    }
}

impl fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("root", &self.root)
            .field("entry", &self.entry)
            .field("ephemeral", &self.is_ephemeral())
            .finish()
    }
}

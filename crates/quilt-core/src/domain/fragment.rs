//! Fragments and the actions they are made of.
//!
//! A fragment is pure data: an ordered list of [`Action`]s plus optional
//! metadata. Loading a fragment from disk is an adapter concern; this module
//! only defines the shape (serde) and its structural validation.
//!
//! # On-disk shape
//!
//! ```toml
//! [fragment]
//! name = "database"
//!
//! [[actions]]
//! type = "add-dependency"
//! name = "ulid"
//!
//! [[actions]]
//! type = "when"
//! option = "database"
//!
//! [[actions.cases.sqlite3]]
//! type = "insert"
//! path = "config/database.yml"
//! before = "  cache:"
//! content = "  errors:"
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use super::anchor::{Anchor, ScopeKind};
use super::common::RelativePath;
use super::dependency::Group;
use super::DomainError;

/// Directory `initializer` actions write into.
pub const INITIALIZERS_DIR: &str = "config/initializers";
/// Directory `lib` actions write into.
pub const LIB_DIR: &str = "lib";
/// File holding the application class `environment` actions edit.
pub const APPLICATION_FILE: &str = "config/application.rb";
/// Scope `environment` actions inject into.
pub const APPLICATION_SCOPE: &str = "Application";
/// Marker per-environment settings are inserted after.
pub const ENVIRONMENT_MARKER: &str = "Rails.application.configure do";

/// Descriptive metadata; never affects execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An ordered, composable script of file mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fragment {
    #[serde(default, rename = "fragment")]
    pub metadata: FragmentMetadata,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Fragment {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            metadata: FragmentMetadata::default(),
            actions,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Check every action, including nested ones.
    ///
    /// Placeholders are only rendered at execution time, so patterns that
    /// contain `{{` are compiled later instead of here.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.actions.iter().try_for_each(Action::validate)
    }
}

/// How file-creating actions treat an existing destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    /// Fail with `AlreadyExists`.
    #[default]
    Create,
    /// Leave the existing file alone.
    Ensure,
    /// Replace the existing file.
    Overwrite,
}

/// A package inside a `dependency-group` action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// One step of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Action {
    CreateFile {
        path: String,
        content: String,
        #[serde(default)]
        mode: CreateMode,
        #[serde(default)]
        indent: Option<usize>,
    },
    AppendFile {
        path: String,
        content: String,
        #[serde(default)]
        indent: Option<usize>,
    },
    Insert {
        path: String,
        #[serde(default)]
        after: Option<String>,
        #[serde(default)]
        before: Option<String>,
        #[serde(default)]
        regex: bool,
        content: String,
        #[serde(default)]
        indent: Option<usize>,
    },
    Substitute {
        path: String,
        pattern: String,
        replacement: String,
        #[serde(default)]
        regex: bool,
    },
    InjectScope {
        path: String,
        scope: String,
        #[serde(default)]
        kind: ScopeKind,
        content: String,
    },
    CopyFile {
        source: String,
        #[serde(default)]
        destination: Option<String>,
        #[serde(default)]
        mode: CreateMode,
    },
    CopyDirectory {
        source: String,
        #[serde(default)]
        destination: Option<String>,
        #[serde(default)]
        mode: CreateMode,
    },
    Initializer {
        name: String,
        content: String,
        #[serde(default)]
        mode: CreateMode,
    },
    Lib {
        name: String,
        content: String,
        #[serde(default)]
        mode: CreateMode,
    },
    Environment {
        content: String,
        #[serde(default)]
        env: Option<String>,
    },
    AddDependency {
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        group: Group,
    },
    DependencyGroup {
        groups: Vec<Group>,
        packages: Vec<Package>,
    },
    When {
        option: String,
        #[serde(default)]
        cases: BTreeMap<String, Vec<Action>>,
        #[serde(default)]
        otherwise: Vec<Action>,
    },
    Apply {
        source: String,
        #[serde(default)]
        entry: Option<String>,
    },
    Defer {
        actions: Vec<Action>,
        #[serde(default)]
        label: Option<String>,
    },
    Run {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        label: Option<String>,
    },
}

impl Action {
    /// The `type` tag this action is written with.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => "create-file",
            Self::AppendFile { .. } => "append-file",
            Self::Insert { .. } => "insert",
            Self::Substitute { .. } => "substitute",
            Self::InjectScope { .. } => "inject-scope",
            Self::CopyFile { .. } => "copy-file",
            Self::CopyDirectory { .. } => "copy-directory",
            Self::Initializer { .. } => "initializer",
            Self::Lib { .. } => "lib",
            Self::Environment { .. } => "environment",
            Self::AddDependency { .. } => "add-dependency",
            Self::DependencyGroup { .. } => "dependency-group",
            Self::When { .. } => "when",
            Self::Apply { .. } => "apply",
            Self::Defer { .. } => "defer",
            Self::Run { .. } => "run",
        }
    }

    /// Select the branch of a `when` action for `value`.
    ///
    /// Values without a case, and a missing value, take `otherwise`.
    /// Returns `None` for every other action kind.
    pub fn branch(&self, value: Option<&str>) -> Option<&[Action]> {
        match self {
            Self::When {
                cases, otherwise, ..
            } => Some(
                value
                    .and_then(|v| cases.get(v))
                    .map_or(otherwise.as_slice(), Vec::as_slice),
            ),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::CreateFile { path, .. }
            | Self::AppendFile { path, .. }
            | Self::InjectScope { path, .. } => check_path(path),
            Self::Insert {
                path,
                after,
                before,
                regex,
                ..
            } => {
                check_path(path)?;
                let marker = match (after, before) {
                    (Some(m), None) | (None, Some(m)) => m,
                    _ => {
                        return Err(DomainError::InvalidFragment(format!(
                            "insert into '{path}' needs exactly one of 'after' or 'before'"
                        )));
                    }
                };
                check_marker(marker, *regex)
            }
            Self::Substitute {
                path,
                pattern,
                regex,
                ..
            } => {
                check_path(path)?;
                check_marker(pattern, *regex)
            }
            Self::CopyFile {
                source,
                destination,
                ..
            }
            | Self::CopyDirectory {
                source,
                destination,
                ..
            } => {
                check_path(source)?;
                destination.as_deref().map_or(Ok(()), check_path)
            }
            Self::Initializer { name, .. } | Self::Lib { name, .. } => check_path(name),
            Self::Environment { env, .. } => match env {
                Some(e) if e.trim().is_empty() || e.contains(['/', '\\']) => Err(
                    DomainError::InvalidFragment(format!("invalid environment name '{e}'")),
                ),
                _ => Ok(()),
            },
            Self::AddDependency { name, .. } => check_non_empty(name, "name"),
            Self::DependencyGroup { groups, packages } => {
                if groups.is_empty() {
                    return Err(DomainError::MissingRequiredField { field: "groups" });
                }
                packages
                    .iter()
                    .try_for_each(|p| check_non_empty(&p.name, "name"))
            }
            Self::When {
                option,
                cases,
                otherwise,
            } => {
                check_non_empty(option, "option")?;
                cases
                    .values()
                    .flatten()
                    .chain(otherwise)
                    .try_for_each(Action::validate)
            }
            Self::Apply { source, .. } => check_non_empty(source, "source"),
            Self::Defer { actions, .. } => actions.iter().try_for_each(Action::validate),
            Self::Run { program, .. } => check_non_empty(program, "program"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Self::CreateFile { path, .. }
            | Self::AppendFile { path, .. }
            | Self::Insert { path, .. }
            | Self::Substitute { path, .. }
            | Self::InjectScope { path, .. } => write!(f, "{kind} {path}"),
            Self::CopyFile { source, .. } | Self::CopyDirectory { source, .. } => {
                write!(f, "{kind} {source}")
            }
            Self::Initializer { name, .. } => write!(f, "{kind} {INITIALIZERS_DIR}/{name}"),
            Self::Lib { name, .. } => write!(f, "{kind} {LIB_DIR}/{name}"),
            Self::Environment { env: Some(env), .. } => write!(f, "{kind} {env}"),
            Self::Environment { env: None, .. } => write!(f, "{kind} {APPLICATION_FILE}"),
            Self::AddDependency { name, .. } => write!(f, "{kind} {name}"),
            Self::DependencyGroup { packages, .. } => {
                let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
                write!(f, "{kind} {}", names.join(","))
            }
            Self::When { option, .. } => write!(f, "{kind} {option}"),
            Self::Apply { source, .. } => write!(f, "{kind} {source}"),
            Self::Defer { label, .. } => match label {
                Some(l) => write!(f, "{kind} {l}"),
                None => f.write_str(kind),
            },
            Self::Run { program, args, .. } => {
                write!(f, "{kind} {program}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

fn check_path(path: &str) -> Result<(), DomainError> {
    RelativePath::try_new(path).map(|_| ())
}

fn check_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::MissingRequiredField { field })
    } else {
        Ok(())
    }
}

fn check_marker(marker: &str, regex: bool) -> Result<(), DomainError> {
    if marker.is_empty() {
        return Err(DomainError::MissingRequiredField { field: "pattern" });
    }
    if regex && !marker.contains("{{") {
        Anchor::pattern(marker)?;
    }
    Ok(())
}

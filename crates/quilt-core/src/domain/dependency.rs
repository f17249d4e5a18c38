//! Dependency ledger: which packages the manifest already declares.
//!
//! The ledger is seeded from the target's line-oriented manifest (a
//! `Gemfile`) before a run starts and is updated as `add-dependency` actions
//! write new declarations. A package name is declared at most once per run;
//! re-declaring it is a no-op, not an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Install group a dependency belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    #[default]
    Default,
    Development,
    Test,
}

impl Group {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Development => "development",
            Self::Test => "test",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim().trim_start_matches(':').trim_matches(['"', '\'']) {
            "default" => Some(Self::Default),
            "development" => Some(Self::Development),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of install groups; empty means the default group.
pub type GroupSet = BTreeSet<Group>;

/// One package declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub name: String,
    pub groups: GroupSet,
    pub version: Option<String>,
}

impl DependencyDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: GroupSet::new(),
            version: None,
        }
    }

    pub fn in_group(mut self, group: Group) -> Self {
        if group != Group::Default {
            self.groups.insert(group);
        }
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.trim().is_empty());
        self
    }

    /// The manifest line for this declaration, without indentation.
    pub fn manifest_line(&self) -> String {
        match &self.version {
            Some(v) => format!("gem \"{}\", \"{}\"", self.name, v),
            None => format!("gem \"{}\"", self.name),
        }
    }
}

/// Tracks declared package names and the groups they were declared under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyLedger {
    entries: BTreeMap<String, GroupSet>,
}

fn gem_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*gem\s+["']([^"']+)["'](.*)$"#).expect("static regex is valid")
    })
}

fn group_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*group\s+(.+?)\s+do\s*$").expect("static regex is valid"))
}

fn inline_groups() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"groups?:\s*(\[[^\]]*\]|:\w+)").expect("static regex is valid")
    })
}

fn parse_group_list(list: &str) -> GroupSet {
    list.trim_matches(['[', ']'])
        .split(',')
        .filter_map(Group::from_symbol)
        .filter(|g| *g != Group::Default)
        .collect()
}

impl DependencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from existing manifest text.
    pub fn seed(manifest: &str) -> Self {
        let mut ledger = Self::new();
        let mut block: Option<GroupSet> = None;

        for line in manifest.lines() {
            if let Some(caps) = group_open().captures(line) {
                block = Some(parse_group_list(&caps[1]));
                continue;
            }
            if block.is_some() && line.trim() == "end" {
                block = None;
                continue;
            }
            if let Some(caps) = gem_line().captures(line) {
                let mut groups = block.clone().unwrap_or_default();
                if let Some(inline) = inline_groups().captures(&caps[2]) {
                    groups.extend(parse_group_list(&inline[1]));
                }
                ledger
                    .entries
                    .entry(caps[1].to_string())
                    .or_default()
                    .extend(groups);
            }
        }

        debug!(packages = ledger.len(), "dependency ledger seeded");
        ledger
    }

    /// Record a declaration. Returns `true` when the name was new.
    pub fn declare(&mut self, decl: &DependencyDeclaration) -> bool {
        match self.entries.get(&decl.name) {
            Some(existing) if *existing == decl.groups => {
                debug!(package = %decl.name, "dependency already declared");
                false
            }
            Some(existing) => {
                warn!(
                    package = %decl.name,
                    declared = %format_groups(existing),
                    requested = %format_groups(&decl.groups),
                    "dependency already declared under another group set; keeping existing"
                );
                false
            }
            None => {
                self.entries.insert(decl.name.clone(), decl.groups.clone());
                true
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn groups_of(&self, name: &str) -> Option<&GroupSet> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn format_groups(groups: &GroupSet) -> String {
    if groups.is_empty() {
        return Group::Default.to_string();
    }
    groups.iter().map(|g| g.as_str()).collect::<Vec<_>>().join(",")
}

/// Text to append so `line` lands on its own line at the end of `manifest`.
pub fn manifest_append(manifest: &str, line: &str) -> String {
    if manifest.is_empty() || manifest.ends_with('\n') {
        format!("{line}\n")
    } else {
        format!("\n{line}\n")
    }
}

/// A `group :a, :b do ... end` block holding `decls`.
pub fn group_block(groups: &GroupSet, decls: &[DependencyDeclaration]) -> String {
    let header = groups
        .iter()
        .map(|g| format!(":{g}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut block = format!("\ngroup {header} do\n");
    for decl in decls {
        block.push_str("  ");
        block.push_str(&decl.manifest_line());
        block.push('\n');
    }
    block.push_str("end\n");
    block
}

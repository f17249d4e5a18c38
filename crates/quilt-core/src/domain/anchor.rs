//! Anchor matching: where in a file an edit lands.
//!
//! Matching is textual and structural, never semantic. A marker that appears
//! inside a string literal or a comment still matches.
//!
//! Anchors are computed fresh for every edit. Nothing here caches offsets,
//! because any earlier edit to the same file can shift them.

use std::ops::Range;

use regex::Regex;
use serde::Deserialize;

use super::DomainError;

/// Which side of the anchor an insertion goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    After,
    Before,
}

/// Which structural keyword opens a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    #[default]
    Any,
    Class,
    Module,
}

impl ScopeKind {
    fn keywords(self) -> &'static str {
        match self {
            Self::Any => "class|module",
            Self::Class => "class",
            Self::Module => "module",
        }
    }
}

/// A search target inside one file.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// Exact text.
    Literal(String),
    /// Regular expression.
    Pattern(Regex),
    /// The closing marker of a named `class` / `module` body.
    ScopeEnd { name: String, kind: ScopeKind },
}

impl Anchor {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, DomainError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| DomainError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Build a literal or regex anchor depending on `regex`.
    pub fn text(marker: &str, regex: bool) -> Result<Self, DomainError> {
        if regex {
            Self::pattern(marker)
        } else {
            Ok(Self::literal(marker))
        }
    }

    pub fn scope_end(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self::ScopeEnd {
            name: name.into(),
            kind,
        }
    }
}

/// Every match of `anchor` in `content`, as byte ranges in file order.
///
/// A scope anchor yields at most one empty range: the start of the line
/// holding the scope's closing `end`.
pub fn locate(content: &str, anchor: &Anchor) -> Vec<Range<usize>> {
    match anchor {
        Anchor::Literal(text) if text.is_empty() => Vec::new(),
        Anchor::Literal(text) => content
            .match_indices(text.as_str())
            .map(|(start, m)| start..start + m.len())
            .collect(),
        Anchor::Pattern(re) => re.find_iter(content).map(|m| m.range()).collect(),
        Anchor::ScopeEnd { name, kind } => find_scope(content, name, *kind)
            .map(|scope| scope.close..scope.close)
            .into_iter()
            .collect(),
    }
}

/// Insert `text` next to the first match of `anchor`.
///
/// Returns `None` when the anchor is absent; the caller treats that as a
/// no-op. A bare line of content is kept on its own line: after a marker that
/// ends a line it gets a leading newline, before a marker that starts a line
/// it gets a trailing one.
pub fn insert_relative(
    content: &str,
    anchor: &Anchor,
    position: Position,
    text: &str,
) -> Option<String> {
    let first = locate(content, anchor).into_iter().next()?;

    let (at, piece) = match position {
        Position::After => {
            let at = first.end;
            let at_line_end = at == content.len() || content[at..].starts_with('\n');
            let piece = if at_line_end && !text.starts_with('\n') {
                format!("\n{}", text.trim_end_matches('\n'))
            } else {
                text.to_string()
            };
            (at, piece)
        }
        Position::Before => {
            let at = first.start;
            let at_line_start = at == 0 || content[..at].ends_with('\n');
            let piece = if at_line_start && !text.ends_with('\n') {
                format!("{text}\n")
            } else {
                text.to_string()
            };
            (at, piece)
        }
    };

    let mut out = String::with_capacity(content.len() + piece.len());
    out.push_str(&content[..at]);
    out.push_str(&piece);
    out.push_str(&content[at..]);
    Some(out)
}

/// Replace every occurrence of `anchor` with `replacement`.
///
/// Regex replacements may reference captures (`$1`, `${name}`). Returns
/// `None` when nothing matched.
pub fn substitute(content: &str, anchor: &Anchor, replacement: &str) -> Option<String> {
    match anchor {
        Anchor::Literal(text) => {
            (!text.is_empty() && content.contains(text.as_str()))
                .then(|| content.replace(text.as_str(), replacement))
        }
        Anchor::Pattern(re) => re
            .is_match(content)
            .then(|| re.replace_all(content, replacement).into_owned()),
        Anchor::ScopeEnd { .. } => None,
    }
}

/// Insert `text` just before the closing `end` of the named scope, indented
/// one level deeper than the scope's opening line.
pub fn inject_scope(content: &str, name: &str, kind: ScopeKind, text: &str) -> Option<String> {
    let indent = scope_indent(content, name, kind)?;
    insert_relative(
        content,
        &Anchor::scope_end(name, kind),
        Position::Before,
        &scope_body(&indent, text),
    )
}

/// The text [`inject_scope`] would insert, used for presence checks.
pub fn scope_body(scope_indent: &str, text: &str) -> String {
    let level = format!("{scope_indent}  ");
    let mut body = indent_lines(&dedent(text), &level);
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body
}

/// Indentation of the named scope's opening line, if the scope exists.
pub fn scope_indent(content: &str, name: &str, kind: ScopeKind) -> Option<String> {
    find_scope(content, name, kind).map(|s| s.indent)
}

struct Scope {
    indent: String,
    close: usize,
}

fn find_scope(content: &str, name: &str, kind: ScopeKind) -> Option<Scope> {
    let opening = Regex::new(&format!(
        r"^([ \t]*)(?:{})[ \t]+{}(?:[ \t<;(]|$)",
        kind.keywords(),
        regex::escape(name)
    ))
    .ok()?;

    let mut offset = 0;
    let mut open_indent: Option<String> = None;

    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        match &open_indent {
            None => {
                if let Some(caps) = opening.captures(bare) {
                    open_indent = Some(caps[1].to_string());
                }
            }
            Some(indent) => {
                if let Some(rest) = bare.strip_prefix(indent.as_str()) {
                    if rest.trim_end() == "end" {
                        return Some(Scope {
                            indent: indent.clone(),
                            close: offset,
                        });
                    }
                }
            }
        }
        offset += line.len();
    }

    None
}

/// Prefix every non-blank line with `prefix`.
pub fn indent_lines(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}

/// Indent by `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    indent_lines(text, &" ".repeat(width))
}

/// Strip the space/tab indentation common to every non-blank line.
///
/// Other whitespace (NBSP, ideographic space) counts as content.
pub fn dedent(text: &str) -> String {
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.trim_start_matches([' ', '\t']).to_string()
            } else {
                line[common..].to_string()
            }
        })
        .collect()
}

/// Whether `text` (ignoring surrounding whitespace) already occurs in `content`.
pub fn already_present(content: &str, text: &str) -> bool {
    let needle = text.trim();
    !needle.is_empty() && content.contains(needle)
}

//! Run configuration and content rendering.
//!
//! [`RunConfig`] is the configuration snapshot a run is invoked with: the
//! application name plus a flat map of named options. Conditional actions
//! branch on it; [`RenderContext`] exposes it to fragment content as
//! `{{PLACEHOLDER}}` variables.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use chrono::Datelike;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Default dependency manifest, relative to the target root.
pub const DEFAULT_MANIFEST: &str = "Gemfile";

/// Configuration snapshot supplied when a run starts.
///
/// Immutable for the duration of the run: every conditional sees the same
/// values no matter where in the fragment tree it sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    app_name: String,
    options: BTreeMap<String, String>,
    manifest: String,
}

impl RunConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            options: BTreeMap::new(),
            manifest: DEFAULT_MANIFEST.to_string(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Parse and add a `key=value` pair.
    pub fn with_option_pair(self, pair: &str) -> Result<Self, DomainError> {
        let (key, value) = parse_option(pair)?;
        Ok(self.with_option(key, value))
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }
}

/// Split `key=value`; the key is trimmed and must be non-empty.
pub fn parse_option(pair: &str) -> Result<(String, String), DomainError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| DomainError::InvalidOption(pair.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(DomainError::InvalidOption(pair.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Context for rendering fragment content.
///
/// ## Built-in Variables
///
/// | Variable | Example | Source |
/// |----------|---------|--------|
/// | `APP_NAME` | "billing api" | Run config |
/// | `APP_NAME_SNAKE` | "billing_api" | Computed |
/// | `APP_NAME_KEBAB` | "billing-api" | Computed |
/// | `APP_NAME_PASCAL` | "BillingApi" | Computed |
/// | `YEAR` | "2026" | System clock |
///
/// Every run option is also available under its own key, e.g. `{{database}}`.
#[derive(Debug, Clone)]
pub struct RenderContext {
    variables: HashMap<String, String>,
}

impl RenderContext {
    pub fn new(app_name: &str) -> Self {
        let mut vars = HashMap::new();

        vars.insert("APP_NAME".to_string(), app_name.to_string());
        vars.insert("APP_NAME_SNAKE".to_string(), to_snake_case(app_name));
        vars.insert("APP_NAME_KEBAB".to_string(), to_kebab_case(app_name));
        vars.insert("APP_NAME_PASCAL".to_string(), to_pascal_case(app_name));
        vars.insert(
            "YEAR".to_string(),
            chrono::Local::now().year().to_string(),
        );

        Self { variables: vars }
    }

    /// Context exposing the app name and every option of `config`.
    pub fn from_config(config: &RunConfig) -> Self {
        config
            .options()
            .iter()
            .fold(Self::new(config.app_name()), |ctx, (k, v)| {
                ctx.with_variable(k.clone(), v.clone())
            })
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    /// Replace `{{VARIABLE}}` placeholders in one pass over `template`.
    /// Unknown placeholders stay as-is, and substituted values are never
    /// scanned again.
    pub fn render(&self, template: &str) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures<'_>| {
                self.variables
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("static regex is valid"))
}

fn to_snake_case(s: &str) -> String {
    split_words(s).join("_")
}

fn to_kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

fn to_pascal_case(s: &str) -> String {
    split_words(s)
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = String::new();
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                    out
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Split on `_`, `-`, whitespace, camelCase transitions and acronym
/// boundaries (`HTTPServer` → `http`, `server`).
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}

//! Rule configuration: per-plugin action overrides and scope exclusions
//!
//! Parses the tab-delimited rule format:
//! ```text
//! # comment lines and blank lines are skipped
//! 10011\tWARN\t(Cookie Without Secure Flag)
//! 50\tFAIL\t(SQL Injection)\tFix before the next release
//! 10015,10202\tOUTOFSCOPE\thttps://example\.com/static/.*
//! *\tOUTOFSCOPE\thttps://example\.com/logout.*
//! ```
//!
//! A rule line carries `id`, an action level, and an annotation; text after a
//! further tab in the annotation becomes the plugin's custom message. An
//! `OUTOFSCOPE` line carries a comma-separated id list (or `*`) and a regex
//! appended to each id's exclusion list.

mod scope;

pub use scope::is_in_scope;

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::client::ScannerRule;
use crate::domain::ActionLevel;

/// Error type for rule file loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read rule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch rule file from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Malformed rule line {line_no}: expected 3 tab-separated fields: {line:?}")]
    MalformedLine { line_no: usize, line: String },

    #[error("Unknown action level {level:?} on line {line_no}: {line:?}")]
    UnknownAction {
        level: String,
        line_no: usize,
        line: String,
    },

    #[error("Invalid exclusion pattern {pattern:?} on line {line_no}: {source}")]
    BadPattern {
        pattern: String,
        line_no: usize,
        #[source]
        source: regex::Error,
    },
}

/// Immutable classification config for a run.
///
/// Loads atomically: any malformed line fails the whole file and leaves no
/// partial state behind.
#[derive(Debug, Default)]
pub struct RuleConfig {
    /// Configured action per plugin id; last occurrence of an id wins
    rules: HashMap<String, ActionLevel>,
    /// Custom user-facing message per plugin id
    messages: HashMap<String, String>,
    /// Exclusion patterns per plugin id, with `*` applying to every id;
    /// evaluated in insertion order
    out_of_scope: HashMap<String, Vec<Regex>>,
}

impl RuleConfig {
    /// An empty config: every plugin id falls back to the default policy
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a rule file from disk
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_lines(content.lines())
    }

    /// Fetch and parse a rule file served over HTTP
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let body = ureq::get(url)
            .call()
            .map_err(|e| ConfigError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .into_string()
            .map_err(|e| ConfigError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_lines(body.lines())
    }

    /// Parse rule lines; blank lines and `#` comments are skipped
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (idx, raw) in lines.enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(3, '\t');
            let (Some(key), Some(val), Some(rest)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(ConfigError::MalformedLine {
                    line_no,
                    line: line.to_string(),
                });
            };

            if val == "OUTOFSCOPE" {
                let pattern = Regex::new(rest).map_err(|source| ConfigError::BadPattern {
                    pattern: rest.to_string(),
                    line_no,
                    source,
                })?;
                for id in key.split(',') {
                    config
                        .out_of_scope
                        .entry(id.trim().to_string())
                        .or_default()
                        .push(pattern.clone());
                }
                continue;
            }

            let Some(action) = ActionLevel::from_str(val) else {
                return Err(ConfigError::UnknownAction {
                    level: val.to_string(),
                    line_no,
                    line: line.to_string(),
                });
            };

            // The third field is the rule-name annotation; anything after a
            // further tab is the custom user-facing message.
            if let Some((_, message)) = rest.split_once('\t') {
                config.messages.insert(key.to_string(), message.to_string());
            }
            config.rules.insert(key.to_string(), action);
        }

        Ok(config)
    }

    /// Configured action for a plugin id, if any
    pub fn action_for(&self, plugin_id: &str) -> Option<ActionLevel> {
        self.rules.get(plugin_id).copied()
    }

    /// Custom message for a plugin id, if any
    pub fn message_for(&self, plugin_id: &str) -> Option<&str> {
        self.messages.get(plugin_id).map(|s| s.as_str())
    }

    /// Whether `url` is still in scope for `plugin_id`
    pub fn is_in_scope(&self, plugin_id: &str, url: &str) -> bool {
        scope::is_in_scope(plugin_id, url, &self.out_of_scope)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Render a rule-file template enumerating every known plugin id with the
/// default WARN action and its human-readable name.
pub fn render_template(scanners: &[ScannerRule]) -> String {
    let mut out = String::new();
    out.push_str("# Rule configuration template\n");
    out.push_str("# Change WARN to IGNORE, INFO, PASS or FAIL to override a rule.\n");
    out.push_str("# Only the rule id and the action are read back; the name is informational.\n");
    for scanner in scanners {
        out.push_str(&format!("{}\tWARN\t({})\n", scanner.id, scanner.name));
    }
    out
}

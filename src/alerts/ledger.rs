//! Progress ledger: findings already tracked in an external remediation tool
//!
//! The ledger file is JSON:
//! ```json
//! {
//!   "issues": [
//!     {"id": "10011", "state": "inprogress", "link": "https://tracker/issue/42"}
//!   ]
//! }
//! ```
//! An issue in state `inprogress` splits its plugin id's WARN/FAIL group into
//! the separate in-progress count without changing the classification.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    issues: Vec<TrackedIssue>,
}

#[derive(Debug, Deserialize)]
struct TrackedIssue {
    id: String,
    state: String,
    #[serde(default)]
    link: Option<String>,
}

/// In-progress issue lookup by plugin id
#[derive(Debug, Default)]
pub struct ProgressLedger {
    in_progress: HashMap<String, Option<String>>,
}

impl ProgressLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read progress file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse progress file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: LedgerFile = serde_json::from_str(content)?;
        let in_progress = file
            .issues
            .into_iter()
            .filter(|issue| issue.state == "inprogress")
            .map(|issue| (issue.id, issue.link))
            .collect();
        Ok(Self { in_progress })
    }

    /// Whether the plugin id is tracked as in progress
    pub fn is_in_progress(&self, plugin_id: &str) -> bool {
        self.in_progress.contains_key(plugin_id)
    }

    /// Tracker link for an in-progress plugin id, when one was recorded
    pub fn link(&self, plugin_id: &str) -> Option<&str> {
        self.in_progress.get(plugin_id)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_in_progress_issues() {
        let ledger = ProgressLedger::from_json(
            r#"{
                "issues": [
                    {"id": "10011", "state": "inprogress", "link": "https://tracker/42"},
                    {"id": "40018", "state": "resolved"}
                ]
            }"#,
        )
        .unwrap();

        assert!(ledger.is_in_progress("10011"));
        assert_eq!(ledger.link("10011"), Some("https://tracker/42"));
        assert!(!ledger.is_in_progress("40018"));
        assert!(!ledger.is_in_progress("99999"));
    }

    #[test]
    fn empty_ledger_tracks_nothing() {
        let ledger = ProgressLedger::empty();
        assert!(!ledger.is_in_progress("10011"));

        let ledger = ProgressLedger::from_json("{}").unwrap();
        assert!(!ledger.is_in_progress("10011"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ProgressLedger::from_json("not json").is_err());
    }
}

//! Scan configuration
//!
//! CLI flags and the optional settings file resolve into one typed
//! [`ScanConfig`] before the driver runs; nothing downstream re-parses user
//! input.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::ActionLevel;
use crate::report::ReportTargets;

/// Settings file name looked up in the working directory
const SETTINGS_FILE: &str = ".baseliner.toml";

/// Where the rule config comes from
#[derive(Debug, Clone, Default)]
pub enum RuleSource {
    /// No overrides: every finding follows the default policy
    #[default]
    None,
    File(PathBuf),
    Url(String),
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Target to scan
    pub target: String,
    /// Base URL of the engine's control API
    pub endpoint: String,
    pub api_key: Option<String>,

    pub rule_source: RuleSource,
    /// Write a rule-file template enumerating the engine's rules after the
    /// catalogues are known
    pub generate_template: Option<PathBuf>,

    pub reports: ReportTargets,
    pub report_dir: PathBuf,

    /// Context definition to import before scanning
    pub context_file: Option<PathBuf>,
    /// Name of the context user to scan as
    pub scan_user: Option<String>,

    pub ajax_spider: bool,
    pub active_scan: bool,
    pub scan_policy: Option<String>,

    /// Spider budget in minutes; 0 means engine-paced (internally bounded)
    pub spider_minutes: u64,
    /// Active scan budget in minutes; 0 means engine-paced
    pub active_scan_minutes: u64,
    /// Passive drain budget in minutes; 0 means engine-paced
    pub passive_drain_minutes: u64,
    /// Extra settle time after spidering, in seconds
    pub delay_seconds: u64,
    /// How long to wait for the engine to become reachable
    pub ready_timeout_seconds: u64,

    /// Unconfigured plugin ids with alerts default to INFO instead of WARN
    pub info_unspecified: bool,
    /// Warnings do not affect the exit code
    pub ignore_warnings: bool,
    /// Minimum severity to show in the per-rule report output
    pub min_display_level: ActionLevel,

    /// Remediation-tracking ledger feeding the new/in-progress split
    pub progress_file: Option<PathBuf>,

    /// Shut the engine down at the end even if we did not launch it
    pub shutdown_engine: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            endpoint: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            rule_source: RuleSource::None,
            generate_template: None,
            reports: ReportTargets::default(),
            report_dir: PathBuf::from("."),
            context_file: None,
            scan_user: None,
            ajax_spider: false,
            active_scan: false,
            scan_policy: None,
            spider_minutes: 1,
            active_scan_minutes: 0,
            passive_drain_minutes: 0,
            delay_seconds: 0,
            ready_timeout_seconds: 600,
            info_unspecified: false,
            ignore_warnings: false,
            min_display_level: ActionLevel::Pass,
            progress_file: None,
            shutdown_engine: false,
        }
    }
}

/// Convert a minute budget into a poll timeout; zero means engine-paced
pub fn phase_timeout(minutes: u64) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(minutes * 60))
}

/// Optional per-directory settings, overridden by CLI flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub report_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        Ok(settings)
    }

    /// Load `.baseliner.toml` from a directory, falling back to defaults
    /// when the file does not exist.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if path.exists() {
            return Self::from_file(&path);
        }
        Ok(Self::default())
    }
}

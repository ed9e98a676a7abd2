//! Report artifact coordination
//!
//! The engine renders report documents; this module only requests the bytes
//! and writes them verbatim. Relative output paths resolve against the
//! configured report directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::client::{ReportFormat, ScannerApi};

/// Report files requested for a run
#[derive(Debug, Clone, Default)]
pub struct ReportTargets {
    pub html: Option<PathBuf>,
    pub markdown: Option<PathBuf>,
    pub xml: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl ReportTargets {
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.markdown.is_none() && self.xml.is_none() && self.json.is_none()
    }

    fn entries(&self) -> impl Iterator<Item = (ReportFormat, &Path)> {
        [
            (ReportFormat::Html, self.html.as_deref()),
            (ReportFormat::Markdown, self.markdown.as_deref()),
            (ReportFormat::Xml, self.xml.as_deref()),
            (ReportFormat::Json, self.json.as_deref()),
        ]
        .into_iter()
        .filter_map(|(format, path)| path.map(|p| (format, p)))
    }
}

/// Fetches report bytes from the engine and persists them
pub struct ReportCoordinator<'a> {
    api: &'a dyn ScannerApi,
    report_dir: PathBuf,
}

impl<'a> ReportCoordinator<'a> {
    pub fn new(api: &'a dyn ScannerApi, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            report_dir: report_dir.into(),
        }
    }

    /// Write every requested report; bytes land on disk exactly as the
    /// engine produced them.
    pub fn write_all(&self, targets: &ReportTargets) -> Result<()> {
        for (format, path) in targets.entries() {
            self.write_report(format, path)?;
        }
        Ok(())
    }

    pub fn write_report(&self, format: ReportFormat, path: &Path) -> Result<()> {
        let bytes = self
            .api
            .report(format)
            .with_context(|| format!("Failed to fetch {} report from engine", format.as_str()))?;

        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create report dir: {}", parent.display()))?;
            }
        }
        std::fs::write(&target, &bytes)
            .with_context(|| format!("Failed to write report: {}", target.display()))?;

        tracing::info!(path = %target.display(), bytes = bytes.len(), format = format.as_str(), "report written");
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.report_dir.join(path)
        }
    }
}

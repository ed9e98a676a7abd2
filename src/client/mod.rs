//! Scanner API: the typed surface of the remote engine's control API
//!
//! Everything the orchestration core needs from the engine goes through the
//! [`ScannerApi`] trait; [`HttpScanner`] is the blocking HTTP/JSON transport.
//! Optional engine capabilities (the ajax spider ships as an add-on) are
//! modeled as [`Availability`] so callers branch explicitly instead of
//! catching errors.

mod http;

pub use http::HttpScanner;

use std::path::Path;

use serde::Deserialize;

use crate::domain::{Alert, ScanUser};

/// Error type for engine API calls
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("engine request failed: {0}")]
    Transport(String),

    #[error("engine returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("failed to parse engine response from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },
}

/// Result of calling an engine capability that may not be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability<T> {
    Available(T),
    Unavailable,
}

impl<T> Availability<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Availability::Unavailable)
    }
}

/// Ajax spider run state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AjaxState {
    Running,
    Stopped,
}

/// One scan rule from the engine's catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerRule {
    pub id: String,
    pub name: String,
    /// Release quality of the rule ("release", "beta", "alpha")
    #[serde(default)]
    pub quality: String,
}

/// Report document formats the engine can render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Xml,
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Xml => "xml",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
        }
    }
}

/// Operations the orchestration core needs from the remote engine.
///
/// Wire framing is the transport's concern; implementations return one typed
/// result per endpoint. Status reads are idempotent and safe to poll.
pub trait ScannerApi {
    /// Engine version; doubles as the readiness probe
    fn version(&self) -> Result<String, ClientError>;

    /// Ask the engine to access a URL so it enters the scan tree
    fn access_url(&self, url: &str) -> Result<(), ClientError>;

    /// Import a context definition file; returns the new context id
    fn import_context(&self, path: &Path) -> Result<String, ClientError>;

    /// Users defined in an imported context
    fn list_users(&self, context_id: &str) -> Result<Vec<ScanUser>, ClientError>;

    /// Start the spider; returns the engine's job token verbatim
    fn start_spider(&self, url: &str, context_name: Option<&str>) -> Result<String, ClientError>;

    /// Spider completion percentage for a job token
    fn spider_status(&self, token: &str) -> Result<u8, ClientError>;

    /// Number of URLs known to the engine after spidering
    fn urls_count(&self) -> Result<usize, ClientError>;

    /// Start the ajax spider, if the add-on is installed
    fn start_ajax_spider(
        &self,
        url: &str,
        context_name: Option<&str>,
    ) -> Result<Availability<()>, ClientError>;

    /// Ajax spider state; there is only ever one ajax spider run
    fn ajax_spider_status(&self) -> Result<Availability<AjaxState>, ClientError>;

    /// Start an active scan; returns the engine's job token verbatim
    fn start_active_scan(
        &self,
        url: &str,
        policy: Option<&str>,
        context_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<String, ClientError>;

    /// Active scan completion percentage for a job token
    fn active_scan_status(&self, token: &str) -> Result<u8, ClientError>;

    /// Records still queued for passive scanning
    fn passive_scan_records_remaining(&self) -> Result<u64, ClientError>;

    /// One page of alerts for a base URL; an empty page ends the paging loop
    fn alerts(&self, base_url: &str, offset: usize, page_size: usize)
    -> Result<Vec<Alert>, ClientError>;

    /// Passive scan rule catalogue
    fn passive_scanners(&self) -> Result<Vec<ScannerRule>, ClientError>;

    /// Active scan rule catalogue for a policy
    fn active_scanners(&self, policy: Option<&str>) -> Result<Vec<ScannerRule>, ClientError>;

    /// Rendered report bytes, written verbatim by the report coordinator
    fn report(&self, format: ReportFormat) -> Result<Vec<u8>, ClientError>;

    /// Ask the engine to shut down
    fn shutdown(&self) -> Result<(), ClientError>;
}

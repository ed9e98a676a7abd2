//! Blocking HTTP/JSON transport for the engine's control API

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::{AjaxState, Availability, ClientError, ReportFormat, ScannerApi, ScannerRule};
use crate::domain::{Alert, ScanUser};

/// Cap on a single report download
const MAX_REPORT_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking client for the engine's JSON control API.
///
/// Endpoints follow the engine's `{base}/json/{component}/{kind}/{action}`
/// framing; each wrapper deserializes into its own response struct.
pub struct HttpScanner {
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl HttpScanner {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(120))
            .build();

        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(
        &self,
        component: &str,
        kind: &str,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<ureq::Response, ClientError> {
        let endpoint = format!("{}/json/{}/{}/{}/", self.base_url, component, kind, action);
        let mut request = self.agent.get(&endpoint);
        for (key, value) in params {
            request = request.query(key, value);
        }
        if let Some(key) = &self.api_key {
            request = request.query("apikey", key);
        }
        request.call().map_err(|e| match e {
            ureq::Error::Status(status, _) => ClientError::Status {
                status,
                endpoint: endpoint.clone(),
            },
            ureq::Error::Transport(t) => ClientError::Transport(t.to_string()),
        })
    }

    fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        component: &str,
        kind: &str,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let endpoint = format!("{}/json/{}/{}/{}/", self.base_url, component, kind, action);
        self.call(component, kind, action, params)?
            .into_json()
            .map_err(|e| ClientError::Parse {
                endpoint,
                reason: e.to_string(),
            })
    }

    /// Engine builds without an add-on answer its endpoints with 404
    fn optional<T>(result: Result<T, ClientError>) -> Result<Availability<T>, ClientError> {
        match result {
            Ok(value) => Ok(Availability::Available(value)),
            Err(ClientError::Status { status: 404, .. }) => Ok(Availability::Unavailable),
            Err(e) => Err(e),
        }
    }

    fn parse_percent(raw: &str, endpoint: &str) -> Result<u8, ClientError> {
        raw.parse::<u8>().map_err(|_| ClientError::Parse {
            endpoint: endpoint.to_string(),
            reason: format!("expected a percentage, got {raw:?}"),
        })
    }
}

impl ScannerApi for HttpScanner {
    fn version(&self) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            version: String,
        }

        let response: Response = self.call_json("core", "view", "version", &[])?;
        Ok(response.version)
    }

    fn access_url(&self, url: &str) -> Result<(), ClientError> {
        self.call("core", "action", "accessUrl", &[("url", url)])?;
        Ok(())
    }

    fn import_context(&self, path: &Path) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            context_id: String,
        }

        let file = path.display().to_string();
        let response: Response =
            self.call_json("context", "action", "importContext", &[("contextFile", &file)])?;
        Ok(response.context_id)
    }

    fn list_users(&self, context_id: &str) -> Result<Vec<ScanUser>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            users: Vec<ScanUser>,
        }

        let response: Response =
            self.call_json("users", "view", "usersList", &[("contextId", context_id)])?;
        Ok(response.users)
    }

    fn start_spider(&self, url: &str, context_name: Option<&str>) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            scan: String,
        }

        let mut params = vec![("url", url)];
        if let Some(name) = context_name {
            params.push(("contextName", name));
        }
        let response: Response = self.call_json("spider", "action", "scan", &params)?;
        Ok(response.scan)
    }

    fn spider_status(&self, token: &str) -> Result<u8, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            status: String,
        }

        let response: Response =
            self.call_json("spider", "view", "status", &[("scanId", token)])?;
        Self::parse_percent(&response.status, "spider/view/status")
    }

    fn urls_count(&self) -> Result<usize, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            urls: Vec<String>,
        }

        let response: Response = self.call_json("core", "view", "urls", &[])?;
        Ok(response.urls.len())
    }

    fn start_ajax_spider(
        &self,
        url: &str,
        context_name: Option<&str>,
    ) -> Result<Availability<()>, ClientError> {
        let mut params = vec![("url", url)];
        if let Some(name) = context_name {
            params.push(("contextName", name));
        }
        Self::optional(self.call("ajaxSpider", "action", "scan", &params).map(|_| ()))
    }

    fn ajax_spider_status(&self) -> Result<Availability<AjaxState>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            status: String,
        }

        let result = self
            .call_json::<Response>("ajaxSpider", "view", "status", &[])
            .map(|r| {
                if r.status == "running" {
                    AjaxState::Running
                } else {
                    AjaxState::Stopped
                }
            });
        Self::optional(result)
    }

    fn start_active_scan(
        &self,
        url: &str,
        policy: Option<&str>,
        context_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            scan: String,
        }

        let mut params = vec![("url", url)];
        if let Some(policy) = policy {
            params.push(("scanPolicyName", policy));
        }
        if let Some(context_id) = context_id {
            params.push(("contextId", context_id));
        }
        if let Some(user_id) = user_id {
            params.push(("userId", user_id));
        }
        let response: Response = self.call_json("ascan", "action", "scan", &params)?;
        Ok(response.scan)
    }

    fn active_scan_status(&self, token: &str) -> Result<u8, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            status: String,
        }

        let response: Response = self.call_json("ascan", "view", "status", &[("scanId", token)])?;
        Self::parse_percent(&response.status, "ascan/view/status")
    }

    fn passive_scan_records_remaining(&self) -> Result<u64, ClientError> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            records_to_scan: String,
        }

        let response: Response = self.call_json("pscan", "view", "recordsToScan", &[])?;
        response
            .records_to_scan
            .parse::<u64>()
            .map_err(|_| ClientError::Parse {
                endpoint: "pscan/view/recordsToScan".to_string(),
                reason: format!("expected a count, got {:?}", response.records_to_scan),
            })
    }

    fn alerts(
        &self,
        base_url: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<Alert>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            alerts: Vec<Alert>,
        }

        let start = offset.to_string();
        let count = page_size.to_string();
        let response: Response = self.call_json(
            "core",
            "view",
            "alerts",
            &[("baseurl", base_url), ("start", &start), ("count", &count)],
        )?;
        Ok(response.alerts)
    }

    fn passive_scanners(&self) -> Result<Vec<ScannerRule>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            scanners: Vec<ScannerRule>,
        }

        let response: Response = self.call_json("pscan", "view", "scanners", &[])?;
        Ok(response.scanners)
    }

    fn active_scanners(&self, policy: Option<&str>) -> Result<Vec<ScannerRule>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            scanners: Vec<ScannerRule>,
        }

        let mut params = Vec::new();
        if let Some(policy) = policy {
            params.push(("scanPolicyName", policy));
        }
        let response: Response = self.call_json("ascan", "view", "scanners", &params)?;
        Ok(response.scanners)
    }

    fn report(&self, format: ReportFormat) -> Result<Vec<u8>, ClientError> {
        let action = match format {
            ReportFormat::Html => "htmlreport",
            ReportFormat::Xml => "xmlreport",
            ReportFormat::Markdown => "mdreport",
            ReportFormat::Json => "jsonreport",
        };
        let endpoint = format!("{}/other/core/other/{}/", self.base_url, action);

        let mut request = self.agent.get(&endpoint);
        if let Some(key) = &self.api_key {
            request = request.query("apikey", key);
        }
        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(status, _) => ClientError::Status {
                status,
                endpoint: endpoint.clone(),
            },
            ureq::Error::Transport(t) => ClientError::Transport(t.to_string()),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_REPORT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ClientError::Parse {
                endpoint,
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    fn shutdown(&self) -> Result<(), ClientError> {
        self.call("core", "action", "shutdown", &[])?;
        Ok(())
    }
}

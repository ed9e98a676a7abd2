//! Shared test scanner for driver integration tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use baseliner::client::{
    AjaxState, Availability, ClientError, ReportFormat, ScannerApi, ScannerRule,
};
use baseliner::domain::{Alert, Risk, ScanUser};

/// Scripted in-memory engine.
///
/// Status sequences pop from the front; an exhausted sequence keeps
/// returning its terminal value so polls always converge.
pub struct FakeScanner {
    state: Mutex<State>,
}

struct State {
    version: Result<String, String>,
    spider_token: String,
    spider_percents: VecDeque<u8>,
    active_token: String,
    active_percents: VecDeque<u8>,
    ajax_available: bool,
    ajax_states: VecDeque<AjaxState>,
    pscan_backlog: VecDeque<u64>,
    alert_pages: VecDeque<Vec<Alert>>,
    urls: usize,
    context_users: Vec<ScanUser>,
    passive_rules: Vec<ScannerRule>,
    active_rules: Vec<ScannerRule>,
    calls: Vec<String>,
}

pub fn alert(plugin_id: &str, risk: Risk, url: &str) -> Alert {
    Alert {
        plugin_id: plugin_id.to_string(),
        name: format!("Rule {plugin_id}"),
        risk,
        url: url.to_string(),
        method: "GET".to_string(),
        evidence: String::new(),
        message_id: "1".to_string(),
    }
}

pub fn rule(id: &str) -> ScannerRule {
    ScannerRule {
        id: id.to_string(),
        name: format!("Rule {id}"),
        quality: "release".to_string(),
    }
}

impl Default for FakeScanner {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                version: Ok("2.14.0".to_string()),
                spider_token: "1".to_string(),
                spider_percents: VecDeque::from([100]),
                active_token: "2".to_string(),
                active_percents: VecDeque::from([100]),
                ajax_available: true,
                ajax_states: VecDeque::from([AjaxState::Stopped]),
                pscan_backlog: VecDeque::from([0]),
                alert_pages: VecDeque::new(),
                urls: 12,
                context_users: Vec::new(),
                passive_rules: Vec::new(),
                active_rules: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }
}

impl FakeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alerts(self, alerts: Vec<Alert>) -> Self {
        self.state.lock().unwrap().alert_pages = VecDeque::from([alerts]);
        self
    }

    pub fn with_passive_rules(self, rules: Vec<ScannerRule>) -> Self {
        self.state.lock().unwrap().passive_rules = rules;
        self
    }

    pub fn with_active_rules(self, rules: Vec<ScannerRule>) -> Self {
        self.state.lock().unwrap().active_rules = rules;
        self
    }

    pub fn with_spider_token(self, token: &str) -> Self {
        self.state.lock().unwrap().spider_token = token.to_string();
        self
    }

    pub fn with_urls(self, urls: usize) -> Self {
        self.state.lock().unwrap().urls = urls;
        self
    }

    pub fn with_context_users(self, users: Vec<ScanUser>) -> Self {
        self.state.lock().unwrap().context_users = users;
        self
    }

    pub fn without_ajax(self) -> Self {
        self.state.lock().unwrap().ajax_available = false;
        self
    }

    /// All recorded API calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn next_or_last<T: Copy>(queue: &mut VecDeque<T>, fallback: T) -> T {
    match queue.len() {
        0 => fallback,
        1 => *queue.front().unwrap(),
        _ => queue.pop_front().unwrap(),
    }
}

impl ScannerApi for FakeScanner {
    fn version(&self) -> Result<String, ClientError> {
        self.record("version".to_string());
        self.state
            .lock()
            .unwrap()
            .version
            .clone()
            .map_err(ClientError::Transport)
    }

    fn access_url(&self, url: &str) -> Result<(), ClientError> {
        self.record(format!("access_url url={url}"));
        Ok(())
    }

    fn import_context(&self, path: &Path) -> Result<String, ClientError> {
        self.record(format!("import_context path={}", path.display()));
        Ok("1".to_string())
    }

    fn list_users(&self, context_id: &str) -> Result<Vec<ScanUser>, ClientError> {
        self.record(format!("list_users context={context_id}"));
        Ok(self.state.lock().unwrap().context_users.clone())
    }

    fn start_spider(&self, url: &str, context_name: Option<&str>) -> Result<String, ClientError> {
        self.record(format!(
            "start_spider url={url} context={}",
            context_name.unwrap_or("-")
        ));
        Ok(self.state.lock().unwrap().spider_token.clone())
    }

    fn spider_status(&self, token: &str) -> Result<u8, ClientError> {
        self.record(format!("spider_status token={token}"));
        Ok(next_or_last(
            &mut self.state.lock().unwrap().spider_percents,
            100,
        ))
    }

    fn urls_count(&self) -> Result<usize, ClientError> {
        self.record("urls_count".to_string());
        Ok(self.state.lock().unwrap().urls)
    }

    fn start_ajax_spider(
        &self,
        url: &str,
        context_name: Option<&str>,
    ) -> Result<Availability<()>, ClientError> {
        self.record(format!(
            "start_ajax_spider url={url} context={}",
            context_name.unwrap_or("-")
        ));
        if self.state.lock().unwrap().ajax_available {
            Ok(Availability::Available(()))
        } else {
            Ok(Availability::Unavailable)
        }
    }

    fn ajax_spider_status(&self) -> Result<Availability<AjaxState>, ClientError> {
        self.record("ajax_spider_status".to_string());
        let mut state = self.state.lock().unwrap();
        if !state.ajax_available {
            return Ok(Availability::Unavailable);
        }
        let value = next_or_last(&mut state.ajax_states, AjaxState::Stopped);
        Ok(Availability::Available(value))
    }

    fn start_active_scan(
        &self,
        url: &str,
        policy: Option<&str>,
        context_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<String, ClientError> {
        self.record(format!(
            "start_active_scan url={url} policy={} context={} user={}",
            policy.unwrap_or("-"),
            context_id.unwrap_or("-"),
            user_id.unwrap_or("-")
        ));
        Ok(self.state.lock().unwrap().active_token.clone())
    }

    fn active_scan_status(&self, token: &str) -> Result<u8, ClientError> {
        self.record(format!("active_scan_status token={token}"));
        Ok(next_or_last(
            &mut self.state.lock().unwrap().active_percents,
            100,
        ))
    }

    fn passive_scan_records_remaining(&self) -> Result<u64, ClientError> {
        self.record("passive_scan_records_remaining".to_string());
        Ok(next_or_last(&mut self.state.lock().unwrap().pscan_backlog, 0))
    }

    fn alerts(
        &self,
        base_url: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<Alert>, ClientError> {
        self.record(format!(
            "alerts base={base_url} offset={offset} count={page_size}"
        ));
        Ok(self
            .state
            .lock()
            .unwrap()
            .alert_pages
            .pop_front()
            .unwrap_or_default())
    }

    fn passive_scanners(&self) -> Result<Vec<ScannerRule>, ClientError> {
        self.record("passive_scanners".to_string());
        Ok(self.state.lock().unwrap().passive_rules.clone())
    }

    fn active_scanners(&self, policy: Option<&str>) -> Result<Vec<ScannerRule>, ClientError> {
        self.record(format!("active_scanners policy={}", policy.unwrap_or("-")));
        Ok(self.state.lock().unwrap().active_rules.clone())
    }

    fn report(&self, format: ReportFormat) -> Result<Vec<u8>, ClientError> {
        self.record(format!("report format={}", format.as_str()));
        Ok(format!("report body ({})", format.as_str()).into_bytes())
    }

    fn shutdown(&self) -> Result<(), ClientError> {
        self.record("shutdown".to_string());
        Ok(())
    }
}

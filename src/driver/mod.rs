//! Scan driver: the top-level state machine
//!
//! Sequences `Launch → AwaitReady → ImportContext? → AccessTarget → Spider →
//! AjaxSpider? → Delay? → ActiveScan? → AwaitPassiveScanDrain →
//! RetrieveAlerts → Classify → EmitReports → Shutdown`. Phase timeouts are
//! logged and skipped over; any other phase failure is caught exactly once
//! here, converted into an `exception_raised` outcome after best-effort
//! cleanup.

mod launcher;

pub use launcher::{ExistingEngine, ProcessLauncher};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;

use crate::alerts::{self, Classifier, DEFAULT_PAGE_SIZE, ProgressLedger};
use crate::client::{AjaxState, Availability, ScannerApi, ScannerRule};
use crate::config::{ScanConfig, phase_timeout};
use crate::domain::{Phase, PhaseProgress, RunOutcome, RunSession};
use crate::hooks::{HookRegistry, points};
use crate::phase::{self, PhaseOutcome, PollCadence};
use crate::report::ReportCoordinator;
use crate::rules::{RuleConfig, render_template};

/// Error type for driver-level input validation
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("scan user {name:?} not found in imported context {context:?}")]
    UserNotFound { name: String, context: String },
}

/// Drives one scan run against an engine endpoint
pub struct ScanDriver<'a> {
    api: &'a dyn ScannerApi,
    rules: &'a RuleConfig,
    ledger: &'a ProgressLedger,
    hooks: &'a HookRegistry,
    config: &'a ScanConfig,
}

impl<'a> ScanDriver<'a> {
    pub fn new(
        api: &'a dyn ScannerApi,
        rules: &'a RuleConfig,
        ledger: &'a ProgressLedger,
        hooks: &'a HookRegistry,
        config: &'a ScanConfig,
    ) -> Self {
        Self {
            api,
            rules,
            ledger,
            hooks,
            config,
        }
    }

    /// Run the full state machine.
    ///
    /// Never returns an error: failures surface as `exception_raised` in the
    /// outcome after diagnostics, best-effort shutdown, and the pre-exit
    /// hook have all had their chance.
    pub fn run(&self, launcher: &dyn ProcessLauncher) -> RunOutcome {
        let mut session = RunSession::new(&self.config.target);

        let outcome = match self.run_phases(launcher, &mut session) {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("ERROR {e:#}");
                tracing::error!(error = ?e, "run aborted");
                launcher.capture_diagnostics();
                // Whatever the engine has so far is better than nothing
                if !self.config.reports.is_empty() {
                    if let Err(e) = ReportCoordinator::new(self.api, &self.config.report_dir)
                        .write_all(&self.config.reports)
                    {
                        tracing::warn!(error = %e, "report flush after abort failed");
                    }
                }
                RunOutcome {
                    exception_raised: true,
                    ..Default::default()
                }
            }
        };

        let elapsed = chrono::Utc::now() - session.started_at;
        tracing::info!(seconds = elapsed.num_seconds(), "run finished");

        self.finish(launcher, &outcome);
        outcome
    }

    fn run_phases(
        &self,
        launcher: &dyn ProcessLauncher,
        session: &mut RunSession,
    ) -> Result<RunOutcome> {
        let endpoint = launcher.launch().context("Failed to launch the engine")?;
        tracing::info!(%endpoint, "engine endpoint resolved");

        let version = self.await_ready()?;
        self.check_version(&version);
        self.hooks.trigger(
            points::ENGINE_STARTED,
            vec![json!(version), json!(session.target.clone())],
        );

        if let Some(path) = &self.config.context_file {
            self.import_context(path.clone(), session)?;
        }

        self.access_target(session)?;
        self.spider(session)?;

        let urls = self.api.urls_count().context("Failed to count scan tree URLs")?;
        let urls_found = urls > 0;
        if urls_found {
            tracing::info!(urls, "scan tree populated");
        } else {
            tracing::warn!("no scannable URLs found");
        }

        if self.config.ajax_spider {
            self.ajax_spider(session)?;
        }

        if self.config.delay_seconds > 0 {
            tracing::info!(seconds = self.config.delay_seconds, "settle delay");
            std::thread::sleep(Duration::from_secs(self.config.delay_seconds));
        }

        if self.config.active_scan {
            self.active_scan(session)?;
        }

        self.passive_drain(session)?;

        let retrieved = alerts::retrieve_alerts(
            |offset, count| self.api.alerts(&session.target, offset, count),
            self.rules,
            DEFAULT_PAGE_SIZE,
        )
        .context("Failed to retrieve alerts")?;

        let catalogue = self.catalogue()?;
        let classification = Classifier::new(self.rules, self.ledger, self.config.info_unspecified)
            .classify(&catalogue, &retrieved.bucket);
        for line in classification.report_lines(self.config.min_display_level) {
            println!("{line}");
        }

        if let Some(path) = &self.config.generate_template {
            std::fs::write(path, render_template(&catalogue))
                .with_context(|| format!("Failed to write rule template: {}", path.display()))?;
            tracing::info!(path = %path.display(), rules = catalogue.len(), "rule template written");
        }

        ReportCoordinator::new(self.api, &self.config.report_dir)
            .write_all(&self.config.reports)?;

        let mut outcome = classification.outcome;
        outcome.urls_found = urls_found;
        Ok(outcome)
    }

    /// Shutdown state: runs on success and failure alike
    fn finish(&self, launcher: &dyn ProcessLauncher, outcome: &RunOutcome) {
        if launcher.owns_engine() || self.config.shutdown_engine {
            if let Err(e) = self.api.shutdown() {
                tracing::warn!(error = %e, "engine shutdown failed");
            }
        }
        if let Err(e) = launcher.teardown() {
            tracing::warn!(error = %e, "launcher teardown failed");
        }
        self.hooks.trigger(
            points::PRE_EXIT,
            vec![
                json!(outcome.fail_count),
                json!(outcome.warn_count),
                json!(outcome.pass_count),
            ],
        );
    }

    /// Poll the version endpoint until the engine answers. The readiness
    /// probe is the one place transport errors are retried for the whole
    /// timeout window.
    fn await_ready(&self) -> Result<String> {
        let deadline =
            Instant::now() + Duration::from_secs(self.config.ready_timeout_seconds.max(1));
        loop {
            match self.api.version() {
                Ok(version) => {
                    tracing::info!(%version, "engine is ready");
                    return Ok(version);
                }
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(e).context("Engine never became reachable");
                    }
                    tracing::debug!(error = %e, "engine not ready yet");
                    std::thread::sleep(phase::READY_POLL_INTERVAL);
                }
            }
        }
    }

    fn check_version(&self, version: &str) {
        match semver::Version::parse(version) {
            Ok(v) if v < semver::Version::new(2, 9, 0) => {
                tracing::warn!(%version, "engine is older than the supported baseline");
            }
            Ok(_) => {}
            Err(_) => tracing::debug!(%version, "engine version is not semver, skipping check"),
        }
    }

    fn import_context(&self, path: PathBuf, session: &mut RunSession) -> Result<()> {
        let args = self.hooks.trigger(
            points::IMPORTING_CONTEXT,
            vec![json!(path.display().to_string())],
        );
        let path = args[0]
            .as_str()
            .map(PathBuf::from)
            .unwrap_or(path);

        let context_id = self
            .api
            .import_context(&path)
            .context("Failed to import context")?;
        let context_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("imported")
            .to_string();
        let users = self
            .api
            .list_users(&context_id)
            .context("Failed to list context users")?;
        tracing::info!(%context_id, %context_name, users = users.len(), "context imported");

        session.context_id = Some(context_id);
        session.context_name = Some(context_name);
        session.users = users;

        if let Some(name) = &self.config.scan_user {
            let user = session.find_user(name).cloned().ok_or_else(|| {
                DriverError::UserNotFound {
                    name: name.clone(),
                    context: session.context_name.clone().unwrap_or_default(),
                }
            })?;
            tracing::info!(user = %user.name, id = %user.id, "scanning as context user");
            session.scan_user = Some(user);
        }
        Ok(())
    }

    fn access_target(&self, session: &mut RunSession) -> Result<()> {
        self.api
            .access_url(&session.target)
            .context("Failed to access the target")?;

        // Deep links are widened to the host root exactly once, so every
        // later phase attacks the whole host instead of one page.
        let root = host_root(&session.target);
        if root != session.target {
            tracing::info!(from = %session.target, to = %root, "normalizing target to host root");
            session.target = root;
        }

        let args = self
            .hooks
            .trigger(points::ENGINE_TUNED, vec![json!(session.target.clone())]);
        if let Some(target) = args[0].as_str() {
            session.target = target.to_string();
        }
        Ok(())
    }

    fn spider(&self, session: &mut RunSession) -> Result<()> {
        let args = self.hooks.trigger(
            points::SPIDER,
            vec![
                json!(session.target.clone()),
                json!(session.context_name.clone()),
            ],
        );
        let target = args[0].as_str().unwrap_or(&session.target).to_string();
        let context_name = args[1]
            .as_str()
            .map(String::from)
            .or_else(|| session.context_name.clone());

        tracing::info!(%target, "spider started");
        let cadence = PollCadence::new(
            phase::SPIDER_POLL_INTERVAL,
            phase_timeout(self.config.spider_minutes),
        );
        let outcome = phase::run_phase(
            cadence,
            || self.api.start_spider(&target, context_name.as_deref()),
            |token| self.api.spider_status(token),
            |percent| {
                tracing::debug!(percent, "spider progress");
                session.advance(Phase::Spider, PhaseProgress::Running(percent));
            },
        )
        .context("Spider failed")?;
        session.advance(Phase::Spider, terminal(outcome));
        log_phase_end(Phase::Spider, outcome);
        Ok(())
    }

    fn ajax_spider(&self, session: &mut RunSession) -> Result<()> {
        let args = self.hooks.trigger(
            points::AJAX_SPIDER,
            vec![
                json!(session.target.clone()),
                json!(session.context_name.clone()),
            ],
        );
        let target = args[0].as_str().unwrap_or(&session.target).to_string();
        let context_name = args[1]
            .as_str()
            .map(String::from)
            .or_else(|| session.context_name.clone());

        match self
            .api
            .start_ajax_spider(&target, context_name.as_deref())
            .context("Failed to start the ajax spider")?
        {
            Availability::Unavailable => {
                tracing::warn!("ajax spider is not installed on the engine, skipping");
                return Ok(());
            }
            Availability::Available(()) => {}
        }

        tracing::info!(%target, "ajax spider started");
        session.advance(Phase::AjaxSpider, PhaseProgress::Running(0));
        let cadence = PollCadence::new(
            phase::SPIDER_POLL_INTERVAL,
            phase_timeout(self.config.spider_minutes),
        );
        let outcome = phase::poll_until(cadence, || {
            Ok(!matches!(
                self.api.ajax_spider_status()?,
                Availability::Available(AjaxState::Running)
            ))
        })
        .context("Ajax spider failed")?;
        session.advance(Phase::AjaxSpider, terminal(outcome));
        log_phase_end(Phase::AjaxSpider, outcome);
        Ok(())
    }

    fn active_scan(&self, session: &mut RunSession) -> Result<()> {
        let args = self.hooks.trigger(
            points::ACTIVE_SCAN,
            vec![
                json!(session.target.clone()),
                json!(self.config.scan_policy.clone()),
            ],
        );
        let target = args[0].as_str().unwrap_or(&session.target).to_string();
        let policy = args[1]
            .as_str()
            .map(String::from)
            .or_else(|| self.config.scan_policy.clone());
        let context_id = session.context_id.clone();
        let user_id = session.scan_user.as_ref().map(|u| u.id.clone());

        tracing::info!(%target, policy = policy.as_deref().unwrap_or("default"), "active scan started");
        let cadence = PollCadence::new(
            phase::ACTIVE_SCAN_POLL_INTERVAL,
            phase_timeout(self.config.active_scan_minutes),
        );
        let outcome = phase::run_phase(
            cadence,
            || {
                self.api.start_active_scan(
                    &target,
                    policy.as_deref(),
                    context_id.as_deref(),
                    user_id.as_deref(),
                )
            },
            |token| self.api.active_scan_status(token),
            |percent| {
                tracing::debug!(percent, "active scan progress");
                session.advance(Phase::ActiveScan, PhaseProgress::Running(percent));
            },
        )
        .context("Active scan failed")?;
        session.advance(Phase::ActiveScan, terminal(outcome));
        log_phase_end(Phase::ActiveScan, outcome);
        Ok(())
    }

    fn passive_drain(&self, session: &mut RunSession) -> Result<()> {
        session.advance(Phase::PassiveScanWait, PhaseProgress::Running(0));
        let cadence = PollCadence::new(
            phase::PASSIVE_DRAIN_POLL_INTERVAL,
            phase_timeout(self.config.passive_drain_minutes),
        );
        let outcome = phase::drain(
            cadence,
            || self.api.passive_scan_records_remaining(),
            |left| tracing::debug!(left, "passive scan backlog"),
        )
        .context("Passive scan drain failed")?;
        session.advance(Phase::PassiveScanWait, terminal(outcome));
        log_phase_end(Phase::PassiveScanWait, outcome);
        Ok(())
    }

    fn catalogue(&self) -> Result<Vec<ScannerRule>> {
        let mut rules = self
            .api
            .passive_scanners()
            .context("Failed to list passive scanners")?;
        if self.config.active_scan {
            rules.extend(
                self.api
                    .active_scanners(self.config.scan_policy.as_deref())
                    .context("Failed to list active scanners")?,
            );
        }
        Ok(rules)
    }
}

fn terminal(outcome: PhaseOutcome) -> PhaseProgress {
    if outcome.completed {
        PhaseProgress::Completed
    } else {
        PhaseProgress::TimedOut
    }
}

fn log_phase_end(phase: Phase, outcome: PhaseOutcome) {
    if outcome.timed_out {
        tracing::warn!(%phase, "phase timed out, continuing");
    } else {
        tracing::info!(%phase, "phase completed");
    }
}

/// Widen a deep link to its host root ("https://h/a/b" → "https://h/").
/// Targets that are already a bare host or host root come back unchanged.
pub fn host_root(target: &str) -> String {
    if target.matches('/').count() <= 2 {
        return target.to_string();
    }
    let scheme_end = target.find("://").map(|i| i + 3).unwrap_or(0);
    match target[scheme_end..].find('/') {
        Some(i) => target[..scheme_end + i + 1].to_string(),
        None => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_paths_widen_to_the_host_root() {
        assert_eq!(
            host_root("https://example.com/app/login?next=/"),
            "https://example.com/"
        );
        assert_eq!(host_root("http://example.com/a"), "http://example.com/");
    }

    #[test]
    fn bare_hosts_are_unchanged() {
        assert_eq!(host_root("https://example.com"), "https://example.com");
        assert_eq!(host_root("https://example.com/"), "https://example.com/");
        assert_eq!(host_root("http://10.0.0.5:8080"), "http://10.0.0.5:8080");
    }
}

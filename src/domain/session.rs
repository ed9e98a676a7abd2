use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Phase, PhaseProgress};

/// A user defined in an imported engine context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanUser {
    pub id: String,
    pub name: String,
}

/// Mutable per-run state threaded by reference through the driver and its
/// components.
///
/// Replaces the hidden module-level globals of the workflow this tool grew
/// out of: context identity, the selected scan user, and per-phase progress
/// all live here and die with the run.
#[derive(Debug)]
pub struct RunSession {
    /// Id of the imported context, when a context file was supplied
    pub context_id: Option<String>,
    /// Name of the imported context
    pub context_name: Option<String>,
    /// Users available in the imported context
    pub users: Vec<ScanUser>,
    /// User the active scan runs as, when one was requested
    pub scan_user: Option<ScanUser>,

    /// Effective target, host-root normalized exactly once after the initial
    /// access request
    pub target: String,

    pub started_at: DateTime<Utc>,
    progress: HashMap<Phase, PhaseProgress>,
}

impl RunSession {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            context_id: None,
            context_name: None,
            users: Vec::new(),
            scan_user: None,
            target: target.into(),
            started_at: Utc::now(),
            progress: HashMap::new(),
        }
    }

    pub fn progress(&self, phase: Phase) -> PhaseProgress {
        self.progress.get(&phase).copied().unwrap_or_default()
    }

    pub fn advance(&mut self, phase: Phase, next: PhaseProgress) {
        self.progress.entry(phase).or_default().advance(next);
    }

    /// Find a context user by name, case-insensitively
    pub fn find_user(&self, name: &str) -> Option<&ScanUser> {
        self.users.iter().find(|u| u.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_defaults_to_not_started() {
        let session = RunSession::new("https://example.com");
        assert_eq!(session.progress(Phase::Spider), PhaseProgress::NotStarted);
    }

    #[test]
    fn advance_tracks_per_phase() {
        let mut session = RunSession::new("https://example.com");
        session.advance(Phase::Spider, PhaseProgress::Completed);
        session.advance(Phase::ActiveScan, PhaseProgress::Running(30));

        assert_eq!(session.progress(Phase::Spider), PhaseProgress::Completed);
        assert_eq!(session.progress(Phase::ActiveScan), PhaseProgress::Running(30));
        assert_eq!(session.progress(Phase::AjaxSpider), PhaseProgress::NotStarted);
    }

    #[test]
    fn finds_users_case_insensitively() {
        let mut session = RunSession::new("https://example.com");
        session.users = vec![ScanUser {
            id: "2".to_string(),
            name: "Test User".to_string(),
        }];

        assert!(session.find_user("test user").is_some());
        assert!(session.find_user("nobody").is_none());
    }
}

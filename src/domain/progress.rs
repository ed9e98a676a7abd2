use serde::{Deserialize, Serialize};

/// One stage of the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Spider,
    AjaxSpider,
    ActiveScan,
    PassiveScanWait,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Spider => "spider",
            Phase::AjaxSpider => "ajax-spider",
            Phase::ActiveScan => "active-scan",
            Phase::PassiveScanWait => "passive-scan-wait",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a single phase.
///
/// Transitions are forward-only; `TimedOut` is terminal and non-fatal (the
/// run logs it and moves to the next phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseProgress {
    #[default]
    NotStarted,
    Running(u8),
    Completed,
    TimedOut,
}

impl PhaseProgress {
    /// Apply a forward transition, ignoring attempts to move backwards out
    /// of a terminal state.
    pub fn advance(&mut self, next: PhaseProgress) {
        if !matches!(self, PhaseProgress::Completed | PhaseProgress::TimedOut) {
            *self = next;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseProgress::Completed | PhaseProgress::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_forward() {
        let mut p = PhaseProgress::NotStarted;
        p.advance(PhaseProgress::Running(40));
        assert_eq!(p, PhaseProgress::Running(40));
        p.advance(PhaseProgress::Completed);
        assert_eq!(p, PhaseProgress::Completed);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut p = PhaseProgress::TimedOut;
        p.advance(PhaseProgress::Running(10));
        assert_eq!(p, PhaseProgress::TimedOut);

        let mut p = PhaseProgress::Completed;
        p.advance(PhaseProgress::NotStarted);
        assert_eq!(p, PhaseProgress::Completed);
    }
}

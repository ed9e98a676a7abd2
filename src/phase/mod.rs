//! Generic poll-until-complete runner for the engine's long-running jobs
//!
//! Every scan phase reduces to the same shape: start a remote job, then poll
//! its status at a fixed cadence until it reports done or the phase budget
//! runs out. Timeouts are non-fatal; the driver logs them and moves on to
//! the next phase. A start call that yields something other than a numeric
//! job token means the engine refused the phase, which is fatal for the run.

use std::time::{Duration, Instant};

use crate::client::ClientError;

/// Poll interval for the initial readiness probe
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Poll interval for spider status
pub const SPIDER_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Poll interval for active scan status
pub const ACTIVE_SCAN_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Poll interval for the passive scan drain
pub const PASSIVE_DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Ceiling applied when a phase has no explicit timeout, so a wedged engine
/// can never hang a run forever
const MAX_UNBOUNDED_WAIT: Duration = Duration::from_secs(3600);

/// Consecutive status-read failures tolerated before the phase errors out
const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 3;

/// Polling cadence for one phase
#[derive(Debug, Clone, Copy)]
pub struct PollCadence {
    pub interval: Duration,
    /// `None` is still bounded by the internal hard ceiling
    pub timeout: Option<Duration>,
}

impl PollCadence {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    fn deadline(&self, started: Instant) -> Instant {
        started + self.timeout.unwrap_or(MAX_UNBOUNDED_WAIT)
    }
}

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub completed: bool,
    pub timed_out: bool,
}

impl PhaseOutcome {
    pub const COMPLETED: PhaseOutcome = PhaseOutcome {
        completed: true,
        timed_out: false,
    };
    pub const TIMED_OUT: PhaseOutcome = PhaseOutcome {
        completed: false,
        timed_out: true,
    };
}

/// Error type for phase execution
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("engine refused to start the phase, got {0:?} instead of a job token")]
    NotStarted(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Poll `poll` at the given cadence until it reports done, the budget runs
/// out, or too many consecutive reads fail.
///
/// Transient read errors are logged and retried on the normal cadence; a
/// third consecutive failure fails the phase.
pub fn poll_until(
    cadence: PollCadence,
    mut poll: impl FnMut() -> Result<bool, ClientError>,
) -> Result<PhaseOutcome, PhaseError> {
    let started = Instant::now();
    let deadline = cadence.deadline(started);
    let mut consecutive_errors = 0u32;

    loop {
        match poll() {
            Ok(true) => return Ok(PhaseOutcome::COMPLETED),
            Ok(false) => consecutive_errors = 0,
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_POLL_ERRORS {
                    return Err(e.into());
                }
                tracing::warn!(error = %e, attempt = consecutive_errors, "status poll failed, retrying");
            }
        }

        if Instant::now() >= deadline {
            tracing::warn!(waited = ?started.elapsed(), "phase timed out, moving on");
            return Ok(PhaseOutcome::TIMED_OUT);
        }
        std::thread::sleep(cadence.interval);
    }
}

/// Drive a token-based phase: start the job, then poll its percentage until
/// it reaches 100.
pub fn run_phase(
    cadence: PollCadence,
    start: impl FnOnce() -> Result<String, ClientError>,
    mut status: impl FnMut(&str) -> Result<u8, ClientError>,
    mut on_tick: impl FnMut(u8),
) -> Result<PhaseOutcome, PhaseError> {
    let token = start()?;
    // Engines report refusal through the start response body rather than an
    // HTTP error, so anything non-numeric is the "not started" sentinel.
    if token.parse::<u64>().is_err() {
        return Err(PhaseError::NotStarted(token));
    }

    poll_until(cadence, || {
        let percent = status(&token)?;
        on_tick(percent);
        Ok(percent >= 100)
    })
}

/// Drive a drain-style phase: poll a backlog counter until it reaches zero.
pub fn drain(
    cadence: PollCadence,
    mut remaining: impl FnMut() -> Result<u64, ClientError>,
    mut on_tick: impl FnMut(u64),
) -> Result<PhaseOutcome, PhaseError> {
    poll_until(cadence, || {
        let left = remaining()?;
        on_tick(left);
        Ok(left == 0)
    })
}

use serde::Serialize;

/// Exit code when the run raised an exception, found nothing to scan, or
/// produced no classification at all.
pub const EXIT_INCONCLUSIVE: i32 = 3;
/// Exit code when at least one plugin id classified as FAIL.
pub const EXIT_FAIL: i32 = 1;
/// Exit code when warnings were raised and not configured to be ignored.
pub const EXIT_WARN: i32 = 2;
/// Exit code for a clean run.
pub const EXIT_OK: i32 = 0;

/// Aggregated counts for a run, accumulated monotonically during
/// classification and consumed exactly once for the process exit status.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunOutcome {
    pub pass_count: usize,
    pub ignore_count: usize,
    pub info_count: usize,
    pub warn_count: usize,
    pub warn_in_progress_count: usize,
    pub fail_count: usize,
    pub fail_in_progress_count: usize,

    /// A phase-level error was caught at the driver boundary
    pub exception_raised: bool,
    /// The spider found at least one scannable URL
    pub urls_found: bool,
}

impl RunOutcome {
    /// Derive the process exit status.
    ///
    /// Precedence is fixed: exception/no-URLs, then FAIL, then WARN (unless
    /// warnings are ignored), then PASS, then inconclusive.
    pub fn exit_code(&self, ignore_warnings: bool) -> i32 {
        if self.exception_raised || !self.urls_found {
            EXIT_INCONCLUSIVE
        } else if self.fail_count > 0 {
            EXIT_FAIL
        } else if self.warn_count > 0 && !ignore_warnings {
            EXIT_WARN
        } else if self.pass_count > 0 {
            EXIT_OK
        } else {
            EXIT_INCONCLUSIVE
        }
    }

    /// The single-line count summary printed at the end of every run
    pub fn summary_line(&self) -> String {
        format!(
            "FAIL-NEW: {}\tFAIL-INPROG: {}\tWARN-NEW: {}\tWARN-INPROG: {}\tINFO: {}\tIGNORE: {}\tPASS: {}",
            self.fail_count,
            self.fail_in_progress_count,
            self.warn_count,
            self.warn_in_progress_count,
            self.info_count,
            self.ignore_count,
            self.pass_count,
        )
    }
}

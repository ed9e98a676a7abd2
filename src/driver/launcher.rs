//! Engine lifecycle seam
//!
//! Bringing the engine up (daemon, container, whatever) is not this tool's
//! job; the driver only needs a reachable endpoint and a way to tear down
//! what was launched. The default launcher points at an engine somebody
//! else is running.

use anyhow::Result;

/// External collaborator responsible for the engine process
pub trait ProcessLauncher {
    /// Bring the engine up; returns the base URL of its control API
    fn launch(&self) -> Result<String>;

    /// Whether this launcher owns the engine process. Owned engines are shut
    /// down at the end of the run.
    fn owns_engine(&self) -> bool;

    /// Best-effort diagnostic capture after a failed run (engine logs etc.)
    fn capture_diagnostics(&self) {}

    /// Release whatever `launch` acquired
    fn teardown(&self) -> Result<()> {
        Ok(())
    }
}

/// Launcher for an engine that is already running
pub struct ExistingEngine {
    endpoint: String,
}

impl ExistingEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl ProcessLauncher for ExistingEngine {
    fn launch(&self) -> Result<String> {
        Ok(self.endpoint.clone())
    }

    fn owns_engine(&self) -> bool {
        false
    }
}

//! baseliner - automated scans against a remote scanning engine
//!
//! baseliner drives a security-scanning engine through its HTTP/JSON control
//! API: spider the target, optionally run the ajax spider and an active
//! scan, wait for the passive scanner to drain, then pull every alert and
//! classify it against a user-supplied rule file. The run collapses to a
//! deterministic exit code (pass/warn/fail) plus whatever report documents
//! the engine was asked to render.
//!
//! The engine itself and its process lifecycle stay external: the core only
//! talks through the [`client::ScannerApi`] trait and the
//! [`driver::ProcessLauncher`] seam.

pub mod alerts;
pub mod client;
pub mod config;
pub mod domain;
pub mod driver;
pub mod hooks;
pub mod phase;
pub mod report;
pub mod rules;

pub use domain::*;

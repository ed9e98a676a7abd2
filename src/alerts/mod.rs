//! Alert retrieval and classification

mod classifier;
mod ledger;

pub use classifier::{Classification, ClassifiedGroup, Classifier};
pub use ledger::ProgressLedger;

use crate::client::ClientError;
use crate::domain::{Alert, AlertBucket, Risk};
use crate::rules::RuleConfig;

/// Default alert page size
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Plugin ids that are never classification-relevant: the engine's example
/// and self-test rules plus internal bookkeeping entries.
pub const PLUGIN_BLACKLIST: &[&str] = &["-1", "50003", "60000", "60001"];

pub fn is_blacklisted(plugin_id: &str) -> bool {
    PLUGIN_BLACKLIST.contains(&plugin_id)
}

/// Result of paging through the engine's alert store
#[derive(Debug)]
pub struct RetrievedAlerts {
    pub bucket: AlertBucket,
    /// Alerts seen before filtering, reported for observability
    pub total_scanned: usize,
}

/// Page through all alerts for the run's target, filtering as we go.
///
/// Dropped on the way in: blacklisted plugin ids, alerts whose URL an
/// exclusion pattern puts out of scope, and all Informational-risk alerts
/// (they may have been downgraded by annotations, so they never classify).
pub fn retrieve_alerts(
    mut fetch_page: impl FnMut(usize, usize) -> Result<Vec<Alert>, ClientError>,
    rules: &RuleConfig,
    page_size: usize,
) -> Result<RetrievedAlerts, ClientError> {
    let mut bucket = AlertBucket::new();
    let mut total_scanned = 0usize;
    let mut offset = 0usize;

    loop {
        let page = fetch_page(offset, page_size)?;
        if page.is_empty() {
            break;
        }
        offset += page_size;
        total_scanned += page.len();

        for alert in page {
            if is_blacklisted(&alert.plugin_id) {
                continue;
            }
            if !rules.is_in_scope(&alert.plugin_id, &alert.url) {
                tracing::debug!(plugin_id = %alert.plugin_id, url = %alert.url, "alert out of scope");
                continue;
            }
            if alert.risk == Risk::Informational {
                continue;
            }
            bucket.push(alert);
        }
    }

    tracing::info!(
        scanned = total_scanned,
        kept = bucket.len(),
        "alert retrieval finished"
    );
    Ok(RetrievedAlerts {
        bucket,
        total_scanned,
    })
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Risk rating attached to an alert by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Risk {
    Informational,
    Low,
    Medium,
    High,
}

impl Risk {
    /// Parse the engine's risk string ("Informational", "Low", ...)
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Informational" => Some(Risk::Informational),
            "Low" => Some(Risk::Low),
            "Medium" => Some(Risk::Medium),
            "High" => Some(Risk::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Informational => "Informational",
            Risk::Low => "Low",
            Risk::Medium => "Medium",
            Risk::High => "High",
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding retrieved from the engine's alert store.
///
/// Immutable once retrieved; the retriever owns filtering, the classifier
/// only groups and counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Id of the scan rule that produced this alert
    #[serde(rename = "pluginId")]
    pub plugin_id: String,

    /// Human-readable rule name
    #[serde(rename = "alert")]
    pub name: String,

    pub risk: Risk,

    /// URL the finding was raised against
    pub url: String,

    /// HTTP method of the offending request
    #[serde(default)]
    pub method: String,

    /// Evidence snippet, when the rule captured one
    #[serde(default)]
    pub evidence: String,

    /// Id of the stored request/response pair backing this alert
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

/// Alerts grouped by plugin id, built fresh per run.
///
/// Ids iterate in sorted order for deterministic reporting; alerts within an
/// id keep retrieval order.
#[derive(Debug, Default)]
pub struct AlertBucket {
    alerts: BTreeMap<String, Vec<Alert>>,
}

impl AlertBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.entry(alert.plugin_id.clone()).or_default().push(alert);
    }

    pub fn get(&self, plugin_id: &str) -> Option<&[Alert]> {
        self.alerts.get(plugin_id).map(|v| v.as_slice())
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.alerts.contains_key(plugin_id)
    }

    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.alerts.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Total number of alerts across all plugin ids
    pub fn len(&self) -> usize {
        self.alerts.values().map(|v| v.len()).sum()
    }
}

use serde::{Deserialize, Serialize};

/// The classification outcome for a plugin id's findings.
///
/// Variants are ordered by severity so the minimum-display-level filter can
/// compare levels directly (`Pass < Ignore < Info < Warn < Fail`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionLevel {
    Pass,
    Ignore,
    Info,
    #[default]
    Warn,
    Fail,
}

impl ActionLevel {
    /// Parse an action level as written in a rule file (upper case)
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(ActionLevel::Pass),
            "IGNORE" => Some(ActionLevel::Ignore),
            "INFO" => Some(ActionLevel::Info),
            "WARN" => Some(ActionLevel::Warn),
            "FAIL" => Some(ActionLevel::Fail),
            _ => None,
        }
    }

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLevel::Pass => "PASS",
            ActionLevel::Ignore => "IGNORE",
            ActionLevel::Info => "INFO",
            ActionLevel::Warn => "WARN",
            ActionLevel::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for ActionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_levels() {
        for (text, level) in [
            ("PASS", ActionLevel::Pass),
            ("IGNORE", ActionLevel::Ignore),
            ("INFO", ActionLevel::Info),
            ("WARN", ActionLevel::Warn),
            ("FAIL", ActionLevel::Fail),
        ] {
            assert_eq!(ActionLevel::from_str(text), Some(level));
            assert_eq!(level.as_str(), text);
        }
    }

    #[test]
    fn rejects_unknown_and_lowercase() {
        assert_eq!(ActionLevel::from_str("warn"), None);
        assert_eq!(ActionLevel::from_str("BLOCK"), None);
    }

    #[test]
    fn severity_ordering() {
        assert!(ActionLevel::Pass < ActionLevel::Ignore);
        assert!(ActionLevel::Info < ActionLevel::Warn);
        assert!(ActionLevel::Warn < ActionLevel::Fail);
    }
}

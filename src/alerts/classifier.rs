//! Rule-based classification of retrieved alerts

use std::collections::BTreeSet;
use std::collections::HashMap;

use super::{ProgressLedger, is_blacklisted};
use crate::client::ScannerRule;
use crate::domain::{ActionLevel, AlertBucket, RunOutcome};
use crate::rules::RuleConfig;

/// URLs shown per classified group before output is cut off
const MAX_URLS_SHOWN: usize = 5;

/// Resolves exactly one action level per plugin id and groups ids by action
/// for reporting.
pub struct Classifier<'a> {
    rules: &'a RuleConfig,
    ledger: &'a ProgressLedger,
    /// Unconfigured plugin ids with alerts default to INFO instead of WARN
    info_unspecified: bool,
}

/// One plugin id's classification result
#[derive(Debug)]
pub struct ClassifiedGroup {
    pub plugin_id: String,
    pub name: String,
    pub action: ActionLevel,
    /// Tracked by the external remediation ledger
    pub in_progress: bool,
    pub link: Option<String>,
    pub alert_count: usize,
    /// First offending URLs with their methods, capped for output
    pub sample_urls: Vec<(String, String)>,
    /// Custom user-facing message from the rule config
    pub message: Option<String>,
}

impl ClassifiedGroup {
    /// Group label as printed in the report ("WARN-NEW", "FAIL-INPROG", ...)
    pub fn label(&self) -> &'static str {
        match (self.action, self.in_progress) {
            (ActionLevel::Pass, _) => "PASS",
            (ActionLevel::Ignore, _) => "IGNORE",
            (ActionLevel::Info, _) => "INFO",
            (ActionLevel::Warn, false) => "WARN-NEW",
            (ActionLevel::Warn, true) => "WARN-INPROG",
            (ActionLevel::Fail, false) => "FAIL-NEW",
            (ActionLevel::Fail, true) => "FAIL-INPROG",
        }
    }
}

/// All groups plus the accumulated counts
#[derive(Debug)]
pub struct Classification {
    pub groups: Vec<ClassifiedGroup>,
    pub outcome: RunOutcome,
}

impl Classification {
    /// Render the human-readable group lines, respecting the minimum
    /// severity to display.
    pub fn report_lines(&self, min_level: ActionLevel) -> Vec<String> {
        let mut lines = Vec::new();
        for group in &self.groups {
            if group.action < min_level {
                continue;
            }

            let mut header = format!("{}: {} [{}]", group.label(), group.name, group.plugin_id);
            if group.alert_count > 0 {
                header.push_str(&format!(" x {}", group.alert_count));
            }
            if let Some(link) = &group.link {
                header.push_str(&format!(" ({link})"));
            }
            lines.push(header);

            if let Some(message) = &group.message {
                lines.push(format!("\t{message}"));
            }
            for (url, method) in &group.sample_urls {
                lines.push(format!("\t{url} ({method})"));
            }
        }
        lines
    }
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleConfig, ledger: &'a ProgressLedger, info_unspecified: bool) -> Self {
        Self {
            rules,
            ledger,
            info_unspecified,
        }
    }

    /// Classify every plugin id present in the engine's rule catalogue or in
    /// the alert bucket.
    pub fn classify(&self, catalogue: &[ScannerRule], bucket: &AlertBucket) -> Classification {
        let names: HashMap<&str, &str> = catalogue
            .iter()
            .map(|rule| (rule.id.as_str(), rule.name.as_str()))
            .collect();

        let mut ids: BTreeSet<&str> = names.keys().copied().collect();
        ids.extend(bucket.plugin_ids());

        let mut groups = Vec::new();
        let mut outcome = RunOutcome::default();

        for id in ids {
            if is_blacklisted(id) {
                continue;
            }

            let alerts = bucket.get(id).unwrap_or(&[]);
            let action = if alerts.is_empty() {
                ActionLevel::Pass
            } else {
                self.resolve(id)
            };

            let in_progress = matches!(action, ActionLevel::Warn | ActionLevel::Fail)
                && self.ledger.is_in_progress(id);

            match (action, in_progress) {
                (ActionLevel::Pass, _) => outcome.pass_count += 1,
                (ActionLevel::Ignore, _) => outcome.ignore_count += 1,
                (ActionLevel::Info, _) => outcome.info_count += 1,
                (ActionLevel::Warn, false) => outcome.warn_count += 1,
                (ActionLevel::Warn, true) => outcome.warn_in_progress_count += 1,
                (ActionLevel::Fail, false) => outcome.fail_count += 1,
                (ActionLevel::Fail, true) => outcome.fail_in_progress_count += 1,
            }

            let name = names
                .get(id)
                .map(|n| n.to_string())
                .or_else(|| alerts.first().map(|a| a.name.clone()))
                .unwrap_or_default();

            groups.push(ClassifiedGroup {
                plugin_id: id.to_string(),
                name,
                action,
                in_progress,
                link: self.ledger.link(id).map(|s| s.to_string()),
                alert_count: alerts.len(),
                sample_urls: alerts
                    .iter()
                    .take(MAX_URLS_SHOWN)
                    .map(|a| (a.url.clone(), a.method.clone()))
                    .collect(),
                message: self.rules.message_for(id).map(|s| s.to_string()),
            });
        }

        Classification { groups, outcome }
    }

    /// Action for a plugin id that has alerts.
    ///
    /// A configured id carries exactly one action; unconfigured ids fall
    /// back to WARN, or INFO when the info-unspecified flag is set.
    fn resolve(&self, plugin_id: &str) -> ActionLevel {
        match self.rules.action_for(plugin_id) {
            Some(action) => action,
            None if self.info_unspecified => ActionLevel::Info,
            None => ActionLevel::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, Risk};

    fn alert(plugin_id: &str, url: &str) -> Alert {
        Alert {
            plugin_id: plugin_id.to_string(),
            name: format!("Rule {plugin_id}"),
            risk: Risk::High,
            url: url.to_string(),
            method: "GET".to_string(),
            evidence: String::new(),
            message_id: "1".to_string(),
        }
    }

    fn catalogue(ids: &[&str]) -> Vec<ScannerRule> {
        ids.iter()
            .map(|id| ScannerRule {
                id: id.to_string(),
                name: format!("Rule {id}"),
                quality: "release".to_string(),
            })
            .collect()
    }

    fn find<'a>(c: &'a Classification, id: &str) -> &'a ClassifiedGroup {
        c.groups.iter().find(|g| g.plugin_id == id).unwrap()
    }

    #[test]
    fn configured_fail_rule_fails_the_matching_alert() {
        let rules = RuleConfig::from_lines("50\tFAIL\t(SQL Injection)".lines()).unwrap();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("50", "https://example.com/login"));

        let classification =
            Classifier::new(&rules, &ledger, false).classify(&catalogue(&["50"]), &bucket);

        assert_eq!(find(&classification, "50").action, ActionLevel::Fail);
        assert_eq!(classification.outcome.fail_count, 1);
        assert_eq!(classification.outcome.pass_count, 0);
        let mut outcome = classification.outcome;
        outcome.urls_found = true;
        assert_eq!(outcome.exit_code(false), 1);
    }

    #[test]
    fn plugin_without_alerts_passes_regardless_of_rules() {
        let rules = RuleConfig::from_lines("50\tFAIL\t(SQL Injection)".lines()).unwrap();
        let ledger = ProgressLedger::empty();
        let bucket = AlertBucket::new();

        let classification =
            Classifier::new(&rules, &ledger, false).classify(&catalogue(&["50", "90"]), &bucket);

        assert_eq!(find(&classification, "50").action, ActionLevel::Pass);
        assert_eq!(find(&classification, "90").action, ActionLevel::Pass);
        assert_eq!(classification.outcome.pass_count, 2);
        let mut outcome = classification.outcome;
        outcome.urls_found = true;
        assert_eq!(outcome.exit_code(false), 0);
    }

    #[test]
    fn unconfigured_id_defaults_to_warn_or_info() {
        let rules = RuleConfig::empty();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("90", "https://example.com"));

        let warned = Classifier::new(&rules, &ledger, false).classify(&[], &bucket);
        assert_eq!(find(&warned, "90").action, ActionLevel::Warn);
        assert_eq!(warned.outcome.warn_count, 1);

        let informed = Classifier::new(&rules, &ledger, true).classify(&[], &bucket);
        assert_eq!(find(&informed, "90").action, ActionLevel::Info);
        assert_eq!(informed.outcome.info_count, 1);
        assert_eq!(informed.outcome.warn_count, 0);
    }

    #[test]
    fn ignore_and_info_rules_classify_accordingly() {
        let rules = RuleConfig::from_lines(
            "10\tIGNORE\t(Noise)\n20\tINFO\t(Heads Up)\n".lines(),
        )
        .unwrap();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("10", "https://example.com/a"));
        bucket.push(alert("20", "https://example.com/b"));

        let classification = Classifier::new(&rules, &ledger, false).classify(&[], &bucket);
        assert_eq!(find(&classification, "10").action, ActionLevel::Ignore);
        assert_eq!(find(&classification, "20").action, ActionLevel::Info);
        assert_eq!(classification.outcome.ignore_count, 1);
        assert_eq!(classification.outcome.info_count, 1);
    }

    #[test]
    fn ledger_splits_new_from_in_progress_without_changing_action() {
        let rules = RuleConfig::from_lines("50\tFAIL\t(SQL Injection)".lines()).unwrap();
        let ledger = ProgressLedger::from_json(
            r#"{"issues": [{"id": "50", "state": "inprogress", "link": "https://tracker/7"}]}"#,
        )
        .unwrap();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("50", "https://example.com"));
        bucket.push(alert("90", "https://example.com"));

        let classification = Classifier::new(&rules, &ledger, false).classify(&[], &bucket);

        let fifty = find(&classification, "50");
        assert_eq!(fifty.action, ActionLevel::Fail);
        assert!(fifty.in_progress);
        assert_eq!(fifty.label(), "FAIL-INPROG");
        assert_eq!(fifty.link.as_deref(), Some("https://tracker/7"));

        assert_eq!(classification.outcome.fail_count, 0);
        assert_eq!(classification.outcome.fail_in_progress_count, 1);
        assert_eq!(classification.outcome.warn_count, 1);
    }

    #[test]
    fn blacklisted_catalogue_entries_are_not_listed() {
        let rules = RuleConfig::empty();
        let ledger = ProgressLedger::empty();
        let classification = Classifier::new(&rules, &ledger, false)
            .classify(&catalogue(&["-1", "50003", "10"]), &AlertBucket::new());

        assert_eq!(classification.groups.len(), 1);
        assert_eq!(classification.groups[0].plugin_id, "10");
        assert_eq!(classification.outcome.pass_count, 1);
    }

    #[test]
    fn report_caps_urls_per_group() {
        let rules = RuleConfig::empty();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        for i in 0..8 {
            bucket.push(alert("90", &format!("https://example.com/{i}")));
        }

        let classification = Classifier::new(&rules, &ledger, false).classify(&[], &bucket);
        let group = find(&classification, "90");
        assert_eq!(group.alert_count, 8);
        assert_eq!(group.sample_urls.len(), 5);
        assert_eq!(group.sample_urls[0].0, "https://example.com/0");

        let lines = classification.report_lines(ActionLevel::Pass);
        assert_eq!(lines[0], "WARN-NEW: Rule 90 [90] x 8");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn report_respects_minimum_display_level() {
        let rules = RuleConfig::from_lines("10\tIGNORE\t(Noise)".lines()).unwrap();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("10", "https://example.com/a"));
        bucket.push(alert("90", "https://example.com/b"));

        let classification =
            Classifier::new(&rules, &ledger, false).classify(&catalogue(&["20"]), &bucket);

        let all = classification.report_lines(ActionLevel::Pass);
        assert!(all.iter().any(|l| l.starts_with("PASS:")));
        assert!(all.iter().any(|l| l.starts_with("IGNORE:")));

        let warnings_only = classification.report_lines(ActionLevel::Warn);
        assert!(warnings_only.iter().all(|l| !l.starts_with("PASS:")));
        assert!(warnings_only.iter().all(|l| !l.starts_with("IGNORE:")));
        assert!(warnings_only.iter().any(|l| l.starts_with("WARN-NEW:")));
    }

    #[test]
    fn custom_message_is_printed_with_the_group() {
        let rules = RuleConfig::from_lines(
            "50\tFAIL\t(SQL Injection)\tEscalate to the platform team".lines(),
        )
        .unwrap();
        let ledger = ProgressLedger::empty();
        let mut bucket = AlertBucket::new();
        bucket.push(alert("50", "https://example.com"));

        let classification = Classifier::new(&rules, &ledger, false).classify(&[], &bucket);
        let lines = classification.report_lines(ActionLevel::Fail);
        assert_eq!(lines[1], "\tEscalate to the platform team");
    }
}

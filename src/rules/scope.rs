//! Scope exclusion check

use std::collections::HashMap;

use regex::Regex;

/// Plugin-id key whose exclusion patterns apply to every plugin id
pub const WILDCARD_ID: &str = "*";

/// Whether `url` is still in scope for `plugin_id`.
///
/// Returns false iff any wildcard pattern or any pattern registered for
/// `plugin_id` matches the URL anchored at the start of the string. This is
/// prefix-match semantics, not full-string equality: exclusions are
/// typically written as URL-prefix patterns.
pub fn is_in_scope(plugin_id: &str, url: &str, out_of_scope: &HashMap<String, Vec<Regex>>) -> bool {
    for key in [WILDCARD_ID, plugin_id] {
        if let Some(patterns) = out_of_scope.get(key) {
            for pattern in patterns {
                // First match wins and short-circuits to out of scope
                if matches_prefix(pattern, url) {
                    return false;
                }
            }
        }
    }
    true
}

fn matches_prefix(pattern: &Regex, url: &str) -> bool {
    pattern.find(url).is_some_and(|m| m.start() == 0)
}

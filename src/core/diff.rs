//! Line diff between the fetched rule set and a prepared save payload

use crate::core::error::Result;
use crate::core::firewall::FirewallRules;
use std::fmt::Write;

/// Renders a `+`/`-` line diff of the pretty-printed JSON of both rule sets.
///
/// Returns `None` when the two rule sets serialize identically.
pub fn compute_diff(server: &FirewallRules, payload: &FirewallRules) -> Result<Option<String>> {
    let old_text = serde_json::to_string_pretty(server)? + "\n";
    let new_text = serde_json::to_string_pretty(payload)? + "\n";

    if old_text == new_text {
        return Ok(None);
    }

    let diff = similar::TextDiff::from_lines(&old_text, &new_text);
    let mut result = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "- ",
            similar::ChangeTag::Insert => "+ ",
            similar::ChangeTag::Equal => "  ",
        };
        let _ = write!(result, "{sign}{change}");
    }

    Ok(Some(result))
}

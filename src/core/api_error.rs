//! Mapping of API validation errors onto rule slots
//!
//! When a save is rejected, the API reports one error per offending field,
//! addressing rules by their position in the submitted payload:
//! `rules.inbound[3].ports`. [`parse_firewall_rule_error`] recognises that
//! shape so the save collaborator can feed a
//! [`RuleEditorAction::SetError`](crate::core::editor::RuleEditorAction::SetError)
//! back into the editor. Anything else is a general error.

use crate::core::editor::{Direction, RuleEditorAction};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An error as reported by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

/// An error attached to a rule slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleFieldError {
    /// Rule field the error refers to (`ports`, `addresses.ipv4`, ...), `None`
    /// when the error concerns the rule as a whole
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

/// An API error addressed to one rule of the submitted payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRuleError {
    pub direction: Direction,
    /// Position in the submitted payload, see
    /// [`prepare_rules`](crate::core::editor::prepare_rules)
    pub index: usize,
    pub error: RuleFieldError,
}

impl ParsedRuleError {
    pub fn into_action(self) -> RuleEditorAction {
        RuleEditorAction::SetError {
            direction: self.direction,
            index: self.index,
            error: self.error,
        }
    }
}

/// Recognises errors whose field reads `rules.<direction>[<index>][.<field>]`.
///
/// The leading `rules.` is optional.
pub fn parse_firewall_rule_error(error: &ApiError) -> Option<ParsedRuleError> {
    let field = error.field.as_deref()?.trim();
    let path = field.strip_prefix("rules.").unwrap_or(field);

    let (direction, rest) = path.split_once('[')?;
    let direction = Direction::from_str(direction).ok()?;
    let (index, rest) = rest.split_once(']')?;
    let index = index.trim().parse::<usize>().ok()?;

    let rule_field = match rest {
        "" => None,
        nested => Some(nested.strip_prefix('.')?.to_string()).filter(|f| !f.is_empty()),
    };

    Some(ParsedRuleError {
        direction,
        index,
        error: RuleFieldError {
            field: rule_field,
            reason: error.reason.clone(),
        },
    })
}

/// Splits API errors into editor actions and general errors, preserving order.
pub fn partition_api_errors(errors: &[ApiError]) -> (Vec<RuleEditorAction>, Vec<ApiError>) {
    let mut actions = Vec::new();
    let mut general = Vec::new();

    for error in errors {
        match parse_firewall_rule_error(error) {
            Some(parsed) => actions.push(parsed.into_action()),
            None => general.push(error.clone()),
        }
    }

    (actions, general)
}

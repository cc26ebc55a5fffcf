//! fwedit - Firewall rule revision editor
//!
//! The editing core of a cloud firewall console, plus the retry toolkit used
//! to poll the API while changes settle.
//!
//! # Architecture
//!
//! - [`core`] - Rule payloads, the revision state machine and its save projection
//! - [`retry`] - Fixed and Fibonacci backoff, sequential retry driver with cancellation
//! - [`audit`] - JSON-lines audit log of prepared saves and retried operations
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories)
//!
//! # Editing Model
//!
//! - Every rule slot keeps its full snapshot history for the session
//! - Editing actions never mutate the input state
//! - Pending deletions are dropped from the save payload
//! - API validation errors are mapped back onto the offending slot

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod retry;
pub mod utils;

// Re-export commonly used types
pub use core::editor::{
    Direction, EditorMode, RuleEditorAction, RuleEditorState, RuleStatus, init_rule_editor_state,
    rule_editor_reducer, rule_editor_state_to_rules,
};
pub use core::error::{Error, Result};
pub use core::firewall::{FirewallRule, FirewallRules, Protocol, RulePatch};

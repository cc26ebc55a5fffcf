//! Firewall rule revision editor
//!
//! An editing session keeps, for every rule slot, the full list of snapshots
//! the slot went through since the rules were fetched. Every change is an
//! explicit [`RuleEditorAction`] fed to [`rule_editor_reducer`], which returns
//! a new [`RuleEditorState`] and leaves its input untouched.
//!
//! # Architecture
//!
//! - [`RuleRevisionList`]: non-empty, append-only history of one rule slot.
//!   The first snapshot is the server state (`NOT_MODIFIED`) or, for slots
//!   created during the session, the sole `NEW` snapshot.
//! - [`RuleEditorState`]: editor mode, the inbound and outbound slot lists and
//!   the default [`Policies`].
//! - [`rule_editor_state_to_rules`]: projects the state into the payload the
//!   save collaborator sends. Pending deletions are left out and the status tag
//!   is stripped.
//!
//! The mode starts at [`EditorMode::Viewing`] and switches to
//! [`EditorMode::Editing`] on the first editing action. Only a re-initialisation
//! ([`RuleEditorAction::Reset`] or [`RuleEditorAction::DiscardChanges`]) brings
//! it back.
//!
//! # Example
//!
//! ```
//! use fwedit::core::editor::{
//!     init_rule_editor_state, rule_editor_state_to_rules, Direction, EditorMode,
//!     RuleEditorAction, RuleStatus,
//! };
//! use fwedit::core::firewall::{FirewallRule, FirewallRules, Protocol, RulePatch};
//!
//! let rules = FirewallRules::new(
//!     vec![FirewallRule::new(Protocol::Tcp).with_ports("22")],
//!     vec![],
//! );
//! let state = init_rule_editor_state(&rules);
//!
//! let state = state
//!     .apply(&RuleEditorAction::ModifyRule {
//!         direction: Direction::Inbound,
//!         index: 0,
//!         patch: RulePatch { ports: Some("2222".into()), ..RulePatch::default() },
//!     })
//!     .unwrap();
//!
//! assert_eq!(state.mode, EditorMode::Editing);
//! assert_eq!(
//!     state.revisions.inbound[0].statuses(),
//!     vec![RuleStatus::NotModified, RuleStatus::Modified]
//! );
//! assert_eq!(rule_editor_state_to_rules(&state).inbound[0].ports.as_deref(), Some("2222"));
//! ```

use crate::core::api_error::RuleFieldError;
use crate::core::error::{Error, Result};
use crate::core::firewall::{FirewallRule, FirewallRules, RuleAction, RulePatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Traffic direction a rule list applies to
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Lifecycle status of a rule snapshot
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    /// Unchanged server-confirmed state
    NotModified,
    /// Edited during this session
    Modified,
    /// Created during this session
    New,
    /// Marked for removal on the next save
    PendingDeletion,
}

/// Whether the session has seen an editing action yet
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EditorMode {
    #[default]
    Viewing,
    Editing,
}

/// One snapshot of a rule slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleRevision {
    #[serde(flatten)]
    pub rule: FirewallRule,
    pub status: RuleStatus,
}

impl RuleRevision {
    pub fn new(rule: FirewallRule, status: RuleStatus) -> Self {
        Self { rule, status }
    }
}

/// Stable identifier of a rule slot
///
/// Positions shift when slots are reordered or created; the id does not.
/// Slots built from server rules get an id derived from their direction and
/// original position, so re-initialising from the same rules yields the same
/// ids. Slots created during the session get a random id.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SlotId(Uuid);

impl SlotId {
    fn original(direction: Direction, index: usize) -> Self {
        let family = match direction {
            Direction::Inbound => 1,
            Direction::Outbound => 2,
        };
        Self(Uuid::from_u64_pair(family, index as u64))
    }

    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Append-only snapshot history of one rule slot
///
/// Non-empty by construction: `first` always exists and `edits` holds every
/// later snapshot, oldest first. Only serialized (for inspection); slots are
/// built by [`init_rule_editor_state`] and the reducer, never parsed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuleRevisionList {
    id: SlotId,
    /// Position of the rule in the fetched rule set, `None` for new slots
    original_index: Option<usize>,
    first: RuleRevision,
    edits: Vec<RuleRevision>,
    /// API errors reported against this slot by the last save attempt
    errors: Vec<RuleFieldError>,
}

impl RuleRevisionList {
    fn from_server(direction: Direction, index: usize, rule: FirewallRule) -> Self {
        Self {
            id: SlotId::original(direction, index),
            original_index: Some(index),
            first: RuleRevision::new(rule, RuleStatus::NotModified),
            edits: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn created(rule: FirewallRule) -> Self {
        Self {
            id: SlotId::fresh(),
            original_index: None,
            first: RuleRevision::new(rule, RuleStatus::New),
            edits: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn original_index(&self) -> Option<usize> {
        self.original_index
    }

    /// The newest snapshot
    pub fn current(&self) -> &RuleRevision {
        self.edits.last().unwrap_or(&self.first)
    }

    /// The oldest snapshot
    pub fn first(&self) -> &RuleRevision {
        &self.first
    }

    /// Every snapshot, oldest first
    pub fn revisions(&self) -> impl Iterator<Item = &RuleRevision> {
        std::iter::once(&self.first).chain(self.edits.iter())
    }

    pub fn statuses(&self) -> Vec<RuleStatus> {
        self.revisions().map(|r| r.status).collect()
    }

    /// Number of snapshots, always at least one
    pub fn len(&self) -> usize {
        1 + self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn errors(&self) -> &[RuleFieldError] {
        &self.errors
    }

    /// Whether the slot was created during this session
    pub fn is_new(&self) -> bool {
        self.first.status == RuleStatus::New
    }

    fn append(&mut self, revision: RuleRevision) {
        self.edits.push(revision);
        self.errors.clear();
    }
}

/// Inbound and outbound slot lists
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Revisions {
    pub inbound: Vec<RuleRevisionList>,
    pub outbound: Vec<RuleRevisionList>,
}

impl Revisions {
    pub fn get(&self, direction: Direction) -> &[RuleRevisionList] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut Vec<RuleRevisionList> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }
}

/// Default policy of each direction, applied to traffic no rule matches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policies {
    pub inbound: RuleAction,
    pub outbound: RuleAction,
}

impl Policies {
    pub fn of(rules: &FirewallRules) -> Self {
        Self {
            inbound: rules.inbound_policy,
            outbound: rules.outbound_policy,
        }
    }

    pub fn get(&self, direction: Direction) -> RuleAction {
        match direction {
            Direction::Inbound => self.inbound,
            Direction::Outbound => self.outbound,
        }
    }

    fn set(&mut self, direction: Direction, policy: RuleAction) {
        match direction {
            Direction::Inbound => self.inbound = policy,
            Direction::Outbound => self.outbound = policy,
        }
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self::of(&FirewallRules::new(Vec::new(), Vec::new()))
    }
}

/// State of one rule editing session
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RuleEditorState {
    pub mode: EditorMode,
    pub revisions: Revisions,
    /// Policies a save would submit
    pub policies: Policies,
    /// Policies as fetched, restored by [`RuleEditorAction::DiscardChanges`]
    original_policies: Policies,
}

/// An editing action
///
/// Serialized with a `type` tag so action scripts read like
/// `{"type": "DELETE_RULE", "direction": "inbound", "index": 1}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleEditorAction {
    /// Append a new slot holding `rule`
    NewRule {
        direction: Direction,
        rule: FirewallRule,
    },
    /// Mark the slot at `index` for deletion
    DeleteRule { direction: Direction, index: usize },
    /// Merge `patch` into the current snapshot of the slot at `index`
    ModifyRule {
        direction: Direction,
        index: usize,
        patch: RulePatch,
    },
    /// Insert a new slot right after `index` holding a copy of its current rule
    CloneRule { direction: Direction, index: usize },
    /// Move the slot at `from` so that it ends up at `to`
    Reorder {
        direction: Direction,
        from: usize,
        to: usize,
    },
    /// Drop the newest snapshot of the slot at `index`
    Undo { direction: Direction, index: usize },
    /// Change the default policy of `direction`
    SetPolicy {
        direction: Direction,
        policy: RuleAction,
    },
    /// Attach an API error to the rule at payload position `index`
    SetError {
        direction: Direction,
        index: usize,
        error: RuleFieldError,
    },
    /// Throw away every change of the session
    DiscardChanges,
    /// Start over from freshly fetched rules
    Reset { rules: FirewallRules },
}

impl RuleEditorAction {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewRule { .. } => "NEW_RULE",
            Self::DeleteRule { .. } => "DELETE_RULE",
            Self::ModifyRule { .. } => "MODIFY_RULE",
            Self::CloneRule { .. } => "CLONE_RULE",
            Self::Reorder { .. } => "REORDER",
            Self::Undo { .. } => "UNDO",
            Self::SetPolicy { .. } => "SET_POLICY",
            Self::SetError { .. } => "SET_ERROR",
            Self::DiscardChanges => "DISCARD_CHANGES",
            Self::Reset { .. } => "RESET",
        }
    }
}

/// Builds the initial session state from server rules.
///
/// Every rule becomes a single `NOT_MODIFIED` snapshot, the fetched policies
/// are the current ones and the mode is [`EditorMode::Viewing`].
pub fn init_rule_editor_state(rules: &FirewallRules) -> RuleEditorState {
    let slots = |direction: Direction, rules: &[FirewallRule]| {
        rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| RuleRevisionList::from_server(direction, idx, rule.clone()))
            .collect()
    };

    RuleEditorState {
        mode: EditorMode::Viewing,
        revisions: Revisions {
            inbound: slots(Direction::Inbound, &rules.inbound),
            outbound: slots(Direction::Outbound, &rules.outbound),
        },
        policies: Policies::of(rules),
        original_policies: Policies::of(rules),
    }
}

/// Applies `action` to `state` and returns the resulting state.
///
/// `state` is never modified. Actions addressing a slot that does not exist
/// fail with [`Error::IndexOutOfRange`].
pub fn rule_editor_reducer(
    state: &RuleEditorState,
    action: &RuleEditorAction,
) -> Result<RuleEditorState> {
    let mut next = state.clone();

    match action {
        RuleEditorAction::NewRule { direction, rule } => {
            next.revisions
                .get_mut(*direction)
                .push(RuleRevisionList::created(rule.clone()));
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::DeleteRule { direction, index } => {
            let slot = slot_mut(&mut next, *direction, *index)?;
            let rule = slot.current().rule.clone();
            slot.append(RuleRevision::new(rule, RuleStatus::PendingDeletion));
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::ModifyRule {
            direction,
            index,
            patch,
        } => {
            let slot = slot_mut(&mut next, *direction, *index)?;
            let rule = slot.current().rule.merge(patch);
            slot.append(RuleRevision::new(rule, RuleStatus::Modified));
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::CloneRule { direction, index } => {
            let slots = next.revisions.get_mut(*direction);
            let source = slots
                .get(*index)
                .ok_or_else(|| Error::out_of_range(*direction, *index, slots.len()))?;
            let copy = RuleRevisionList::created(source.current().rule.clone());
            slots.insert(index + 1, copy);
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::Reorder {
            direction,
            from,
            to,
        } => {
            let slots = next.revisions.get_mut(*direction);
            let len = slots.len();
            for idx in [*from, *to] {
                if idx >= len {
                    return Err(Error::out_of_range(*direction, idx, len));
                }
            }
            let moved = slots.remove(*from);
            slots.insert(*to, moved);
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::Undo { direction, index } => {
            let slots = next.revisions.get_mut(*direction);
            let len = slots.len();
            let slot = slots
                .get_mut(*index)
                .ok_or_else(|| Error::out_of_range(*direction, *index, len))?;

            if slot.edits.pop().is_some() {
                slot.errors.clear();
            } else if slot.is_new() {
                slots.remove(*index);
            }
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::SetPolicy { direction, policy } => {
            next.policies.set(*direction, *policy);
            next.mode = EditorMode::Editing;
        }
        RuleEditorAction::SetError {
            direction,
            index,
            error,
        } => {
            let slots = next.revisions.get_mut(*direction);
            let is_submitted =
                |slot: &&mut RuleRevisionList| slot.current().status != RuleStatus::PendingDeletion;
            let count = slots.iter_mut().filter(is_submitted).count();
            let slot = slots
                .iter_mut()
                .filter(is_submitted)
                .nth(*index)
                .ok_or_else(|| Error::out_of_range(*direction, *index, count))?;
            slot.errors.push(error.clone());
        }
        RuleEditorAction::DiscardChanges => {
            next = init_rule_editor_state(&original_rules(state));
        }
        RuleEditorAction::Reset { rules } => {
            next = init_rule_editor_state(rules);
        }
    }

    tracing::debug!(
        action = action.name(),
        mode = %next.mode,
        inbound = next.revisions.inbound.len(),
        outbound = next.revisions.outbound.len(),
        "Applied rule editor action"
    );

    Ok(next)
}

fn slot_mut(
    state: &mut RuleEditorState,
    direction: Direction,
    index: usize,
) -> Result<&mut RuleRevisionList> {
    let slots = state.revisions.get_mut(direction);
    let len = slots.len();
    slots
        .get_mut(index)
        .ok_or_else(|| Error::out_of_range(direction, index, len))
}

/// Rebuilds the fetched rule set from the first snapshot of every server slot,
/// in server order, with the fetched policies.
fn original_rules(state: &RuleEditorState) -> FirewallRules {
    let originals = |slots: &[RuleRevisionList]| {
        let mut indexed: Vec<(usize, FirewallRule)> = slots
            .iter()
            .filter_map(|slot| {
                slot.original_index
                    .map(|idx| (idx, slot.first.rule.clone()))
            })
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, rule)| rule).collect()
    };

    FirewallRules {
        inbound: originals(&state.revisions.inbound),
        outbound: originals(&state.revisions.outbound),
        inbound_policy: state.original_policies.inbound,
        outbound_policy: state.original_policies.outbound,
    }
}

impl RuleEditorState {
    /// Convenience wrapper around [`rule_editor_reducer`]
    pub fn apply(&self, action: &RuleEditorAction) -> Result<Self> {
        rule_editor_reducer(self, action)
    }

    /// Applies `actions` in order, stopping at the first failure
    pub fn apply_all<'a, I>(&self, actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a RuleEditorAction>,
    {
        actions
            .into_iter()
            .try_fold(self.clone(), |state, action| state.apply(action))
    }

    /// Current position of the slot with the given id
    pub fn slot_index(&self, direction: Direction, id: SlotId) -> Option<usize> {
        self.revisions
            .get(direction)
            .iter()
            .position(|slot| slot.id == id)
    }
}

/// A rule about to be submitted, with enough context to map API errors back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRule {
    pub slot: SlotId,
    /// Position of the rule in the submitted list
    pub index: usize,
    pub rule: FirewallRule,
}

/// Current snapshot of every slot, pending deletions included
pub fn current_revisions(state: &RuleEditorState, direction: Direction) -> Vec<&RuleRevision> {
    state
        .revisions
        .get(direction)
        .iter()
        .map(RuleRevisionList::current)
        .collect()
}

/// The rules of `direction` that a save would submit, in order
pub fn prepare_rules(state: &RuleEditorState, direction: Direction) -> Vec<PreparedRule> {
    state
        .revisions
        .get(direction)
        .iter()
        .filter(|slot| slot.current().status != RuleStatus::PendingDeletion)
        .enumerate()
        .map(|(index, slot)| PreparedRule {
            slot: slot.id,
            index,
            rule: slot.current().rule.clone(),
        })
        .collect()
}

/// Projects the session state into the save payload.
///
/// Pending deletions are excluded; every other slot contributes its current
/// rule without the status tag. The session's current policies complete the
/// payload.
pub fn rule_editor_state_to_rules(state: &RuleEditorState) -> FirewallRules {
    let strip = |prepared: Vec<PreparedRule>| prepared.into_iter().map(|p| p.rule).collect();

    FirewallRules {
        inbound: strip(prepare_rules(state, Direction::Inbound)),
        outbound: strip(prepare_rules(state, Direction::Outbound)),
        inbound_policy: state.policies.inbound,
        outbound_policy: state.policies.outbound,
    }
}

/// Whether saving would change anything on the server
pub fn has_modified(state: &RuleEditorState) -> bool {
    let rules_changed = [&state.revisions.inbound, &state.revisions.outbound]
        .into_iter()
        .any(|slots| {
            slots.iter().enumerate().any(|(position, slot)| {
                slot.current().status != RuleStatus::NotModified
                    || slot.original_index != Some(position)
            })
        });

    rules_changed || state.policies != state.original_policies
}

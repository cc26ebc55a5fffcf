#[cfg(test)]
mod property_tests {
    use crate::core::api_error::RuleFieldError;
    use crate::core::editor::{
        Direction, EditorMode, RuleEditorAction, RuleEditorState, RuleStatus,
        has_modified, init_rule_editor_state, prepare_rules, rule_editor_state_to_rules,
    };
    use crate::core::firewall::{FirewallRule, FirewallRules, Protocol, RuleAction, RulePatch};
    use proptest::prelude::*;

    fn arb_direction() -> impl Strategy<Value = Direction> {
        prop_oneof![Just(Direction::Inbound), Just(Direction::Outbound)]
    }

    prop_compose! {
        fn arb_rule()(
            label in proptest::option::of("[a-z0-9-]{1,16}"),
            protocol in prop_oneof![
                Just(Protocol::Tcp),
                Just(Protocol::Udp),
                Just(Protocol::Icmp),
            ],
            port in proptest::option::of(1u16..=65535),
        ) -> FirewallRule {
            let mut rule = FirewallRule::new(protocol);
            rule.label = label;
            rule.ports = port.map(|p| p.to_string());
            rule
        }
    }

    prop_compose! {
        fn arb_patch()(
            ports in proptest::option::of(1u16..=65535),
            drop in any::<bool>(),
        ) -> RulePatch {
            RulePatch {
                ports: ports.map(|p| p.to_string()),
                action: drop.then_some(RuleAction::Drop),
                ..RulePatch::default()
            }
        }
    }

    prop_compose! {
        fn arb_rules()(
            inbound in proptest::collection::vec(arb_rule(), 0..5),
            outbound in proptest::collection::vec(arb_rule(), 0..5),
        ) -> FirewallRules {
            FirewallRules::new(inbound, outbound)
        }
    }

    /// Editing actions only; indices may be out of range on purpose
    fn arb_action() -> impl Strategy<Value = RuleEditorAction> {
        prop_oneof![
            (arb_direction(), arb_rule())
                .prop_map(|(direction, rule)| RuleEditorAction::NewRule { direction, rule }),
            (arb_direction(), 0usize..6)
                .prop_map(|(direction, index)| RuleEditorAction::DeleteRule { direction, index }),
            (arb_direction(), 0usize..6, arb_patch()).prop_map(|(direction, index, patch)| {
                RuleEditorAction::ModifyRule {
                    direction,
                    index,
                    patch,
                }
            }),
            (arb_direction(), 0usize..6)
                .prop_map(|(direction, index)| RuleEditorAction::CloneRule { direction, index }),
            (arb_direction(), 0usize..6, 0usize..6).prop_map(|(direction, from, to)| {
                RuleEditorAction::Reorder {
                    direction,
                    from,
                    to,
                }
            }),
            (arb_direction(), 0usize..6)
                .prop_map(|(direction, index)| RuleEditorAction::Undo { direction, index }),
            (arb_direction(), any::<bool>()).prop_map(|(direction, drop)| {
                RuleEditorAction::SetPolicy {
                    direction,
                    policy: if drop { RuleAction::Drop } else { RuleAction::Accept },
                }
            }),
            (arb_direction(), 0usize..6).prop_map(|(direction, index)| {
                RuleEditorAction::SetError {
                    direction,
                    index,
                    error: RuleFieldError {
                        field: Some("ports".to_string()),
                        reason: "Invalid port".to_string(),
                    },
                }
            }),
        ]
    }

    /// Applies `actions`, skipping the ones the reducer rejects.
    ///
    /// Returns every state reached and the actions that were accepted;
    /// `applied[i]` turned `states[i]` into `states[i + 1]`.
    fn replay(
        initial: &RuleEditorState,
        actions: &[RuleEditorAction],
    ) -> (Vec<RuleEditorState>, Vec<RuleEditorAction>) {
        let mut states = vec![initial.clone()];
        let mut applied = Vec::new();
        for action in actions {
            let last = states.last().unwrap();
            if let Ok(next) = last.apply(action) {
                states.push(next);
                applied.push(action.clone());
            }
        }
        (states, applied)
    }

    proptest! {
        #[test]
        fn test_history_is_append_only(
            rules in arb_rules(),
            actions in proptest::collection::vec(arb_action(), 0..20),
        ) {
            let (states, applied) = replay(&init_rule_editor_state(&rules), &actions);

            for (pair, action) in states.windows(2).zip(&applied) {
                let (before, after) = (&pair[0], &pair[1]);
                let undone = match action {
                    RuleEditorAction::Undo { direction, index } => {
                        Some(before.revisions.get(*direction)[*index].id())
                    }
                    _ => None,
                };

                for direction in [Direction::Inbound, Direction::Outbound] {
                    for slot in before.revisions.get(direction) {
                        let idx = after.slot_index(direction, slot.id());
                        let Some(idx) = idx else {
                            prop_assert_eq!(undone, Some(slot.id()), "only undo drops slots");
                            prop_assert!(slot.is_new() && slot.len() == 1);
                            continue;
                        };
                        let later = &after.revisions.get(direction)[idx];
                        let earlier: Vec<_> = slot.revisions().collect();
                        let kept = if undone == Some(slot.id()) {
                            // Undo pops at most one snapshot and never the first
                            let expected = slot.len().saturating_sub(1).max(1);
                            prop_assert_eq!(later.len(), expected);
                            expected
                        } else {
                            prop_assert!(later.len() >= slot.len());
                            slot.len()
                        };
                        let prefix: Vec<_> = later.revisions().take(kept).collect();
                        prop_assert_eq!(prefix, earlier[..kept].to_vec());
                    }
                }
            }
        }

        #[test]
        fn test_mode_is_monotone(
            rules in arb_rules(),
            actions in proptest::collection::vec(arb_action(), 0..20),
        ) {
            let (states, applied) = replay(&init_rule_editor_state(&rules), &actions);

            prop_assert_eq!(states[0].mode, EditorMode::Viewing);
            for (pair, action) in states.windows(2).zip(&applied) {
                let (before, after) = (&pair[0], &pair[1]);
                if before.mode == EditorMode::Editing {
                    prop_assert_eq!(after.mode, EditorMode::Editing);
                }
                // Attaching an API error is the only action that is not an edit
                if !matches!(action, RuleEditorAction::SetError { .. }) {
                    prop_assert_eq!(after.mode, EditorMode::Editing);
                }
            }
        }

        #[test]
        fn test_first_snapshot_status(
            rules in arb_rules(),
            actions in proptest::collection::vec(arb_action(), 0..20),
        ) {
            let (states, _) = replay(&init_rule_editor_state(&rules), &actions);
            let last = states.last().unwrap();

            for direction in [Direction::Inbound, Direction::Outbound] {
                for slot in last.revisions.get(direction) {
                    let expected = if slot.original_index().is_some() {
                        RuleStatus::NotModified
                    } else {
                        RuleStatus::New
                    };
                    prop_assert_eq!(slot.first().status, expected);
                    for later in slot.revisions().skip(1) {
                        prop_assert_ne!(later.status, RuleStatus::NotModified);
                    }
                }
            }
        }

        #[test]
        fn test_projection_excludes_exactly_pending_deletions(
            rules in arb_rules(),
            actions in proptest::collection::vec(arb_action(), 0..20),
        ) {
            let (states, _) = replay(&init_rule_editor_state(&rules), &actions);
            let last = states.last().unwrap();
            let payload = rule_editor_state_to_rules(last);

            for (direction, projected) in [
                (Direction::Inbound, &payload.inbound),
                (Direction::Outbound, &payload.outbound),
            ] {
                let kept: Vec<FirewallRule> = last
                    .revisions
                    .get(direction)
                    .iter()
                    .filter(|slot| slot.current().status != RuleStatus::PendingDeletion)
                    .map(|slot| slot.current().rule.clone())
                    .collect();
                prop_assert_eq!(&kept, projected);

                let prepared = prepare_rules(last, direction);
                for (position, rule) in prepared.iter().enumerate() {
                    prop_assert_eq!(rule.index, position);
                }
            }
            prop_assert_eq!(payload.inbound_policy, last.policies.inbound);
            prop_assert_eq!(payload.outbound_policy, last.policies.outbound);
        }

        #[test]
        fn test_discard_changes_is_a_full_reset(
            rules in arb_rules(),
            actions in proptest::collection::vec(arb_action(), 0..20),
        ) {
            let initial = init_rule_editor_state(&rules);
            let (states, _) = replay(&initial, &actions);

            let discarded = states
                .last()
                .unwrap()
                .apply(&RuleEditorAction::DiscardChanges)
                .unwrap();
            prop_assert_eq!(&discarded, &initial);
            prop_assert!(!has_modified(&discarded));
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use bijux_fleet_drift::{diff_desired, diff_states};
use bijux_fleet_model::{ActualStateSnapshot, DesiredState, DriftStatus, PolicyId, SettingMap};
use proptest::prelude::*;
use serde_json::{json, Value};

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn state_strategy() -> impl Strategy<Value = BTreeMap<PolicyId, SettingMap>> {
    proptest::collection::btree_map(
        "[a-c][a-z0-9-]{0,3}".prop_map(|s| PolicyId::new(s).expect("policy id")),
        proptest::collection::btree_map("[a-d]", value_strategy(), 0..4),
        0..5,
    )
}

proptest! {
    #[test]
    fn self_diff_is_clean(state in state_strategy()) {
        let desired = DesiredState::new(state);
        let actual = ActualStateSnapshot::from_desired(&desired, "fleet", 7);
        prop_assert!(diff_desired(&desired, &actual, None).is_clean());
    }

    #[test]
    fn diff_is_structurally_symmetric(a in state_strategy(), b in state_strategy()) {
        let forward = diff_states(&a, &b);
        let backward = diff_states(&b, &a);
        prop_assert_eq!(forward.len(), backward.len());
        for (f, r) in forward.iter().zip(backward.iter()) {
            prop_assert_eq!(&f.mirrored(), r);
        }
    }

    #[test]
    fn entries_are_sorted_by_policy_then_key(a in state_strategy(), b in state_strategy()) {
        let entries = diff_states(&a, &b);
        let keys: Vec<(PolicyId, String)> = entries
            .iter()
            .map(|e| (e.policy_id.clone(), e.setting_key.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    #[test]
    fn added_entries_mirror_removed_entries(a in state_strategy(), b in state_strategy()) {
        let forward = diff_states(&a, &b);
        let backward = diff_states(&b, &a);
        let count = |entries: &[bijux_fleet_model::DriftEntry], s: DriftStatus| {
            entries.iter().filter(|e| e.status == s).count()
        };
        prop_assert_eq!(count(&forward, DriftStatus::Added), count(&backward, DriftStatus::Removed));
        prop_assert_eq!(count(&forward, DriftStatus::Changed), count(&backward, DriftStatus::Changed));
    }
}

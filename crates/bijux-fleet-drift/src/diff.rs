// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use bijux_fleet_core::Hash256;
use bijux_fleet_model::{
    ActualStateSnapshot, DesiredState, DriftEntry, DriftReport, DriftStatus, PolicyId, PolicySet,
    SettingMap,
};

use crate::normalize::values_equivalent;

/// Diffs every document of `desired` against the snapshot.
#[must_use]
pub fn diff(desired: &PolicySet, actual: &ActualStateSnapshot) -> DriftReport {
    diff_desired(
        &DesiredState::from_policy_set(desired),
        actual,
        Some(desired.hash()),
    )
}

/// Diffs an already scoped desired state, e.g. `DesiredState::for_ring`.
#[must_use]
pub fn diff_desired(
    desired: &DesiredState,
    actual: &ActualStateSnapshot,
    policy_set_hash: Option<Hash256>,
) -> DriftReport {
    DriftReport::new(
        policy_set_hash,
        &actual.selector,
        actual.captured_at_epoch_seconds,
        diff_states(desired.policies(), &actual.policies),
    )
}

/// Drift of the policies `managed` owns. Observed policies outside that set
/// are not under management and never count as drift.
#[must_use]
pub fn diff_managed(
    managed: &DesiredState,
    actual: &ActualStateSnapshot,
    policy_set_hash: Option<Hash256>,
) -> DriftReport {
    let observed: BTreeMap<PolicyId, SettingMap> = actual
        .policies
        .iter()
        .filter(|(id, _)| managed.policies().contains_key(*id))
        .map(|(id, settings)| (id.clone(), settings.clone()))
        .collect();
    DriftReport::new(
        policy_set_hash,
        &actual.selector,
        actual.captured_at_epoch_seconds,
        diff_states(managed.policies(), &observed),
    )
}

/// Classifies every (policy, setting) pair present on either side. Output
/// is ordered by policy id then setting key.
#[must_use]
pub fn diff_states(
    desired: &BTreeMap<PolicyId, SettingMap>,
    actual: &BTreeMap<PolicyId, SettingMap>,
) -> Vec<DriftEntry> {
    let empty = SettingMap::new();
    let policies: BTreeSet<&PolicyId> = desired.keys().chain(actual.keys()).collect();
    let mut entries = Vec::new();
    for policy in policies {
        let want = desired.get(policy).unwrap_or(&empty);
        let have = actual.get(policy).unwrap_or(&empty);
        let keys: BTreeSet<&String> = want.keys().chain(have.keys()).collect();
        for key in keys {
            let entry = match (want.get(key), have.get(key)) {
                (Some(d), None) => Some(DriftEntry::new(
                    policy.clone(),
                    key,
                    DriftStatus::Added,
                    Some(d.clone()),
                    None,
                )),
                (None, Some(a)) => Some(DriftEntry::new(
                    policy.clone(),
                    key,
                    DriftStatus::Removed,
                    None,
                    Some(a.clone()),
                )),
                (Some(d), Some(a)) if !values_equivalent(d, a) => Some(DriftEntry::new(
                    policy.clone(),
                    key,
                    DriftStatus::Changed,
                    Some(d.clone()),
                    Some(a.clone()),
                )),
                _ => None,
            };
            entries.extend(entry);
        }
    }
    entries
}

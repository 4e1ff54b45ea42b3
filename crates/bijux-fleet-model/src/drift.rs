// SPDX-License-Identifier: Apache-2.0

use bijux_fleet_core::Hash256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::PolicyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    /// Desired but not observed.
    Added,
    /// Observed but not desired.
    Removed,
    Changed,
}

impl DriftStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
        }
    }

    /// Status of the same entry when desired and actual trade places.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Added => Self::Removed,
            Self::Removed => Self::Added,
            Self::Changed => Self::Changed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriftEntry {
    pub policy_id: PolicyId,
    pub setting_key: String,
    pub status: DriftStatus,
    /// New value (what the policy set asks for).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<Value>,
    /// Old value (what the fleet reports).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl DriftEntry {
    #[must_use]
    pub fn new(
        policy_id: PolicyId,
        setting_key: &str,
        status: DriftStatus,
        desired: Option<Value>,
        actual: Option<Value>,
    ) -> Self {
        Self {
            policy_id,
            setting_key: setting_key.to_string(),
            status,
            desired,
            actual,
        }
    }

    /// Dotted `policy.setting` form used in operator output.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.policy_id, self.setting_key)
    }

    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            policy_id: self.policy_id.clone(),
            setting_key: self.setting_key.clone(),
            status: self.status.mirrored(),
            desired: self.actual.clone(),
            actual: self.desired.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriftReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_set_hash: Option<Hash256>,
    pub selector: String,
    pub captured_at_epoch_seconds: u64,
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    /// Entries are stored ordered by policy id then setting key.
    #[must_use]
    pub fn new(
        policy_set_hash: Option<Hash256>,
        selector: &str,
        captured_at_epoch_seconds: u64,
        mut entries: Vec<DriftEntry>,
    ) -> Self {
        entries.sort_by(|a, b| {
            a.policy_id
                .cmp(&b.policy_id)
                .then_with(|| a.setting_key.cmp(&b.setting_key))
        });
        Self {
            policy_set_hash,
            selector: selector.to_string(),
            captured_at_epoch_seconds,
            entries,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn count(&self, status: DriftStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::{DriftEntry, DriftReport, DriftStatus};
    use crate::ids::PolicyId;
    use serde_json::json;

    fn id(s: &str) -> PolicyId {
        PolicyId::new(s).expect("id")
    }

    #[test]
    fn report_orders_by_policy_then_key() {
        let report = DriftReport::new(
            None,
            "qa",
            0,
            vec![
                DriftEntry::new(id("usb"), "a", DriftStatus::Added, Some(json!(1)), None),
                DriftEntry::new(id("fw"), "z", DriftStatus::Removed, None, Some(json!(1))),
                DriftEntry::new(id("fw"), "b", DriftStatus::Changed, Some(json!(2)), Some(json!(1))),
            ],
        );
        let keys: Vec<String> = report.entries.iter().map(DriftEntry::key).collect();
        assert_eq!(keys, vec!["fw.b", "fw.z", "usb.a"]);
        assert_eq!(report.count(DriftStatus::Changed), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn mirrored_entry_swaps_sides() {
        let entry = DriftEntry::new(id("fw"), "timeout", DriftStatus::Changed, Some(json!(600)), Some(json!(300)));
        let mirror = entry.mirrored();
        assert_eq!(mirror.desired, Some(json!(300)));
        assert_eq!(mirror.actual, Some(json!(600)));
        assert_eq!(DriftStatus::Added.mirrored(), DriftStatus::Removed);
        assert_eq!(mirror.mirrored(), entry);
    }
}

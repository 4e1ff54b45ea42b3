// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{PolicyId, RingName};
use crate::policy::PolicySet;
use crate::ValidationError;

pub type SettingMap = BTreeMap<String, Value>;

/// Flattened desired settings per policy, the shape the drift detector and
/// apply backends consume.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState {
    policies: BTreeMap<PolicyId, SettingMap>,
}

impl DesiredState {
    #[must_use]
    pub fn new(policies: BTreeMap<PolicyId, SettingMap>) -> Self {
        Self { policies }
    }

    /// Every document in the set, regardless of ring scope.
    #[must_use]
    pub fn from_policy_set(set: &PolicySet) -> Self {
        Self {
            policies: set
                .documents()
                .map(|doc| (doc.id.clone(), doc.body.clone()))
                .collect(),
        }
    }

    /// Documents that travel through `ring`: scoped to it and not reserved
    /// for emergency use.
    #[must_use]
    pub fn for_ring(set: &PolicySet, ring: &RingName) -> Self {
        Self {
            policies: set
                .documents()
                .filter(|doc| doc.applies_to_ring(ring) && !doc.is_emergency_use_only())
                .map(|doc| (doc.id.clone(), doc.body.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn policies(&self) -> &BTreeMap<PolicyId, SettingMap> {
        &self.policies
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Point-in-time observation of one device population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActualStateSnapshot {
    pub selector: String,
    pub captured_at_epoch_seconds: u64,
    pub policies: BTreeMap<PolicyId, SettingMap>,
}

impl ActualStateSnapshot {
    #[must_use]
    pub fn new(
        selector: &str,
        captured_at_epoch_seconds: u64,
        policies: BTreeMap<PolicyId, SettingMap>,
    ) -> Self {
        Self {
            selector: selector.to_string(),
            captured_at_epoch_seconds,
            policies,
        }
    }

    #[must_use]
    pub fn from_desired(desired: &DesiredState, selector: &str, captured_at_epoch_seconds: u64) -> Self {
        Self::new(selector, captured_at_epoch_seconds, desired.policies.clone())
    }

    /// Reads either the native snapshot document or the collector export
    /// shape `{policy: {"settings": {...}}}`. The latter carries no selector
    /// or capture time, so `default_selector` and 0 are used.
    pub fn parse_snapshot_json(bytes: &[u8], default_selector: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError(format!("snapshot is not valid JSON: {e}")))?;
        let Value::Object(root) = value else {
            return Err(ValidationError("snapshot must be a JSON object".to_string()));
        };
        if root.get("policies").is_some_and(Value::is_object) {
            return serde_json::from_value(Value::Object(root))
                .map_err(|e| ValidationError(format!("snapshot: {e}")));
        }

        let mut policies = BTreeMap::new();
        for (name, entry) in root {
            let id = PolicyId::new(name.clone())?;
            let settings = entry
                .get("settings")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    ValidationError(format!("snapshot entry `{name}` has no settings object"))
                })?;
            policies.insert(
                id,
                settings
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
        }
        Ok(Self::new(default_selector, 0, policies))
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use bijux_fleet_core::canonical::stable_json_hash;
use bijux_fleet_core::Hash256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{PolicyId, RingName};
use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
    Ios,
    Android,
    CrossPlatform,
}

impl Platform {
    pub const ALL: [Self; 6] = [
        Self::Windows,
        Self::Macos,
        Self::Linux,
        Self::Ios,
        Self::Android,
        Self::CrossPlatform,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::CrossPlatform => "cross-platform",
        }
    }

    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RolloutStrategy {
    Ringed,
    ManualOnly,
}

impl RolloutStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ringed => "ringed",
            Self::ManualOnly => "manual-only",
        }
    }

    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        [Self::Ringed, Self::ManualOnly]
            .into_iter()
            .find(|s| s.as_str() == input)
    }
}

/// Ownership and risk metadata. Fields the fleet does not interpret are
/// carried in `extra` so they still contribute to the set hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskTier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approver_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_ticket_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_strategy: Option<RolloutStrategy>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub emergency_use_only: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PolicyMetadata {
    #[must_use]
    pub fn new(owner: &str, risk_level: RiskTier) -> Self {
        Self {
            owner: Some(owner.to_string()),
            risk_level: Some(risk_level),
            approver_groups: Vec::new(),
            change_ticket_required: None,
            rollout_strategy: None,
            emergency_use_only: false,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyScope {
    pub supported_rings: Vec<RingName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConstraints {
    #[serde(default)]
    pub auto_expire: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One desired-state document. `id` travels as `name` and `body` as
/// `settings` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    #[serde(rename = "name")]
    pub id: PolicyId,
    pub platform: Platform,
    pub version: String,
    pub metadata: PolicyMetadata,
    #[serde(rename = "settings")]
    pub body: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PolicyScope>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub telemetry_expectations: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_constraints: Option<TimeConstraints>,
}

impl PolicyDocument {
    #[must_use]
    pub fn new(
        id: PolicyId,
        platform: Platform,
        version: &str,
        metadata: PolicyMetadata,
        body: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            id,
            platform,
            version: version.to_string(),
            metadata,
            body,
            scope: None,
            telemetry_expectations: BTreeMap::new(),
            time_constraints: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, rings: Vec<RingName>) -> Self {
        self.scope = Some(PolicyScope {
            supported_rings: rings,
        });
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(key) = self.body.keys().find(|k| k.trim().is_empty()) {
            return Err(ValidationError(format!(
                "policy `{}` has an empty setting key `{key}`",
                self.id
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_emergency_use_only(&self) -> bool {
        self.metadata.emergency_use_only
    }

    /// Documents without a scope apply to every ring.
    #[must_use]
    pub fn applies_to_ring(&self, ring: &RingName) -> bool {
        match &self.scope {
            Some(scope) => scope.supported_rings.iter().any(|r| r == ring),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicySetWire {
    hash: Hash256,
    documents: Vec<PolicyDocument>,
}

/// Immutable, content-addressed bundle of documents keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicySetWire", into = "PolicySetWire")]
pub struct PolicySet {
    hash: Hash256,
    documents: BTreeMap<PolicyId, PolicyDocument>,
}

impl PolicySet {
    pub fn new(documents: Vec<PolicyDocument>) -> Result<Self, ValidationError> {
        let mut by_id = BTreeMap::new();
        for doc in documents {
            doc.validate()?;
            let id = doc.id.clone();
            if by_id.insert(id.clone(), doc).is_some() {
                return Err(ValidationError(format!("duplicate policy id `{id}`")));
            }
        }
        let hash = content_hash(&by_id)?;
        Ok(Self {
            hash,
            documents: by_id,
        })
    }

    #[must_use]
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    #[must_use]
    pub fn get(&self, id: &PolicyId) -> Option<&PolicyDocument> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &PolicyDocument> {
        self.documents.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Hash over the canonical JSON of documents in id order, so insertion
/// order never leaks into the identity of the set.
fn content_hash(documents: &BTreeMap<PolicyId, PolicyDocument>) -> Result<Hash256, ValidationError> {
    let ordered: Vec<&PolicyDocument> = documents.values().collect();
    stable_json_hash(&ordered).map_err(|e| ValidationError(format!("policy set hash: {e}")))
}

impl TryFrom<PolicySetWire> for PolicySet {
    type Error = ValidationError;

    fn try_from(wire: PolicySetWire) -> Result<Self, ValidationError> {
        let set = Self::new(wire.documents)?;
        if set.hash != wire.hash {
            return Err(ValidationError(format!(
                "policy set hash mismatch: stored {} computed {}",
                wire.hash, set.hash
            )));
        }
        Ok(set)
    }
}

impl From<PolicySet> for PolicySetWire {
    fn from(set: PolicySet) -> Self {
        Self {
            hash: set.hash,
            documents: set.documents.into_values().collect(),
        }
    }
}

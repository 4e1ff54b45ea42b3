// SPDX-License-Identifier: Apache-2.0

use bijux_fleet_core::canonical::stable_json_hash;
use bijux_fleet_core::Hash256;
use serde::{Deserialize, Serialize};

use crate::ids::{AttemptId, RingName};
use crate::ValidationError;

/// Integrity value the first record chains from.
pub const GENESIS_INTEGRITY: Hash256 = Hash256::ZERO;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Validate,
    GateCheck,
    Apply,
    Rollback,
    Correction,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::GateCheck => "gate_check",
            Self::Apply => "apply",
            Self::Rollback => "rollback",
            Self::Correction => "correction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Ok,
    Rejected,
    Failed,
}

impl AuditResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Record contents before the log assigns an index and chains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub timestamp: u64,
    pub actor: String,
    pub policy_set_hash: Option<Hash256>,
    pub ring: Option<RingName>,
    pub action: AuditAction,
    pub result: AuditResult,
    pub detail: String,
    pub attempt_id: Option<AttemptId>,
    pub references: Option<u64>,
}

impl AuditDraft {
    #[must_use]
    pub fn new(action: AuditAction, result: AuditResult, actor: &str, timestamp: u64) -> Self {
        Self {
            timestamp,
            actor: actor.to_string(),
            policy_set_hash: None,
            ring: None,
            action,
            result,
            detail: String::new(),
            attempt_id: None,
            references: None,
        }
    }

    #[must_use]
    pub fn policy_set(mut self, hash: Hash256) -> Self {
        self.policy_set_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn ring(mut self, ring: &RingName) -> Self {
        self.ring = Some(ring.clone());
        self
    }

    #[must_use]
    pub fn attempt(mut self, id: &AttemptId) -> Self {
        self.attempt_id = Some(id.clone());
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[must_use]
    pub fn references(mut self, index: u64) -> Self {
        self.references = Some(index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditRecord {
    pub index: u64,
    pub timestamp: u64,
    pub actor: String,
    pub policy_set_hash: Option<Hash256>,
    pub ring: Option<RingName>,
    pub action: AuditAction,
    pub result: AuditResult,
    pub detail: String,
    pub attempt_id: Option<AttemptId>,
    pub references: Option<u64>,
    pub prev_integrity: Hash256,
    pub integrity: Hash256,
}

#[derive(Serialize)]
struct IntegrityInput<'a> {
    index: u64,
    timestamp: u64,
    actor: &'a str,
    policy_set_hash: Option<Hash256>,
    ring: Option<&'a RingName>,
    action: AuditAction,
    result: AuditResult,
    detail: &'a str,
    attempt_id: Option<&'a AttemptId>,
    references: Option<u64>,
    prev_integrity: Hash256,
}

impl AuditRecord {
    pub fn seal(draft: AuditDraft, index: u64, prev_integrity: Hash256) -> Result<Self, ValidationError> {
        let mut record = Self {
            index,
            timestamp: draft.timestamp,
            actor: draft.actor,
            policy_set_hash: draft.policy_set_hash,
            ring: draft.ring,
            action: draft.action,
            result: draft.result,
            detail: draft.detail,
            attempt_id: draft.attempt_id,
            references: draft.references,
            prev_integrity,
            integrity: Hash256::ZERO,
        };
        record.integrity = record.compute_integrity()?;
        Ok(record)
    }

    /// SHA-256 over the canonical JSON of every field except `integrity`.
    pub fn compute_integrity(&self) -> Result<Hash256, ValidationError> {
        let input = IntegrityInput {
            index: self.index,
            timestamp: self.timestamp,
            actor: &self.actor,
            policy_set_hash: self.policy_set_hash,
            ring: self.ring.as_ref(),
            action: self.action,
            result: self.result,
            detail: &self.detail,
            attempt_id: self.attempt_id.as_ref(),
            references: self.references,
            prev_integrity: self.prev_integrity,
        };
        stable_json_hash(&input).map_err(|e| ValidationError(format!("audit integrity: {e}")))
    }

    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        self.compute_integrity()
            .map(|h| h == self.integrity)
            .unwrap_or(false)
    }
}

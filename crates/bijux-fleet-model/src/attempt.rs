// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use bijux_fleet_core::Hash256;
use serde::{Deserialize, Serialize};

use crate::ids::{AttemptId, RingName};
use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionState {
    Requested,
    Validating,
    Gated,
    Applying,
    Applied,
    Rejected,
    RollingBack,
    RolledBack,
}

impl PromotionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Validating => "validating",
            Self::Gated => "gated",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
        }
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Validating)
                | (Self::Validating, Self::Gated)
                | (Self::Validating, Self::Rejected)
                | (Self::Gated, Self::Applying)
                | (Self::Gated, Self::Rejected)
                | (Self::Applying, Self::Applied)
                | (Self::Applying, Self::Rejected)
                | (Self::Applied, Self::RollingBack)
                | (Self::RollingBack, Self::RolledBack)
                | (Self::RollingBack, Self::Applied)
        )
    }

    /// Operator-facing outcome. `RollingBack -> Applied` is the recovery
    /// edge taken when the re-apply of the prior set fails.
    #[must_use]
    pub const fn outcome(self) -> AttemptOutcome {
        match self {
            Self::Requested | Self::Validating => AttemptOutcome::Pending,
            Self::Gated | Self::Applying => AttemptOutcome::Approved,
            Self::Applied | Self::RollingBack => AttemptOutcome::Applied,
            Self::Rejected => AttemptOutcome::Rejected,
            Self::RolledBack => AttemptOutcome::RolledBack,
        }
    }
}

impl fmt::Display for PromotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Approved,
    Rejected,
    Applied,
    RolledBack,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
            Self::RolledBack => "rolled_back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InvalidPolicySet,
    CollectorUnavailable,
    GateRejected,
    SequencingError,
    ApplyError,
}

impl RejectionKind {
    /// Machine code shared with CLI error output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPolicySet => "schema_error",
            Self::CollectorUnavailable => "collector_unavailable",
            Self::GateRejected => "gate_rejected",
            Self::SequencingError => "sequencing_error",
            Self::ApplyError => "apply_error",
        }
    }
}

/// Why an attempt ended in `Rejected`. For gate rejections `reason` is the
/// rule code (`ticket-required`, `drift-present`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
    pub detail: String,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: RejectionKind, reason: &str, detail: &str) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}: {}", self.kind.as_str(), self.reason, self.detail)
    }
}

/// Separately authorized bypass of ring sequencing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmergencyOverride {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateTransition {
    pub from: PromotionState,
    pub to: PromotionState,
    pub at_epoch_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromotionAttempt {
    pub id: AttemptId,
    pub policy_set_hash: Hash256,
    pub ring: RingName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_ticket: Option<String>,
    pub requested_at_epoch_seconds: u64,
    pub actor: String,
    pub state: PromotionState,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_override: Option<EmergencyOverride>,
    /// Set once rolled back: the policy set that was re-applied in its place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_policy_set: Option<Hash256>,
}

impl PromotionAttempt {
    #[must_use]
    pub fn new(
        id: AttemptId,
        policy_set_hash: Hash256,
        ring: RingName,
        change_ticket: Option<String>,
        actor: &str,
        requested_at_epoch_seconds: u64,
    ) -> Self {
        Self {
            id,
            policy_set_hash,
            ring,
            change_ticket,
            requested_at_epoch_seconds,
            actor: actor.to_string(),
            state: PromotionState::Requested,
            transitions: Vec::new(),
            rejection: None,
            emergency_override: None,
            restored_policy_set: None,
        }
    }

    pub fn transition(&mut self, next: PromotionState, now: u64) -> Result<(), ValidationError> {
        if !self.state.can_transition_to(next) {
            return Err(ValidationError(format!(
                "attempt {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            at_epoch_seconds: now,
        });
        self.state = next;
        Ok(())
    }

    pub fn reject(&mut self, rejection: Rejection, now: u64) -> Result<(), ValidationError> {
        self.transition(PromotionState::Rejected, now)?;
        self.rejection = Some(rejection);
        Ok(())
    }

    #[must_use]
    pub fn outcome(&self) -> AttemptOutcome {
        self.state.outcome()
    }
}

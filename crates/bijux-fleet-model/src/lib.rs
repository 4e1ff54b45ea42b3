// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Fleet policy model SSOT: documents, content-addressed sets, snapshots,
//! drift reports, rings, promotion attempts, audit records and the
//! last-known-good table.

use std::fmt::{Display, Formatter};

mod attempt;
mod audit;
mod drift;
mod ids;
mod lkg;
mod policy;
mod ring;
mod state;
mod ticket;

pub use attempt::{
    AttemptOutcome, EmergencyOverride, PromotionAttempt, PromotionState, Rejection, RejectionKind,
    StateTransition,
};
pub use audit::{AuditAction, AuditDraft, AuditRecord, AuditResult, GENESIS_INTEGRITY};
pub use drift::{DriftEntry, DriftReport, DriftStatus};
pub use ids::{AttemptId, PolicyId, RingName, ATTEMPT_ID_MAX_LEN, POLICY_ID_MAX_LEN, RING_NAME_MAX_LEN};
pub use lkg::{LastKnownGood, LkgEntry};
pub use policy::{
    Platform, PolicyDocument, PolicyMetadata, PolicyScope, PolicySet, RiskTier, RolloutStrategy,
    TimeConstraints,
};
pub use ring::{RequiredGates, Ring, RingCatalog, DEFAULT_TELEMETRY_FRESHNESS_SECS};
pub use state::{ActualStateSnapshot, DesiredState, SettingMap};
pub use ticket::{ChangeTicket, TicketVerdict, CHANGE_TICKET_PATTERN};

pub const CRATE_NAME: &str = "bijux-fleet-model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

// SPDX-License-Identifier: Apache-2.0

//! Contracts for the systems the controller drives but does not own.
//! Vendor backends implement these; `crate::local` has file-backed
//! stand-ins.

use std::fmt::{Display, Formatter};

use bijux_fleet_model::{ActualStateSnapshot, ChangeTicket, PolicySet, RingName, TicketVerdict};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    #[must_use]
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} unavailable: {}", self.collaborator, self.message)
    }
}

impl std::error::Error for CollaboratorError {}

pub trait InventoryCollector: Send + Sync {
    fn fetch_actual_state(&self, selector: &str) -> Result<ActualStateSnapshot, CollaboratorError>;
}

pub trait ChangeControl: Send + Sync {
    fn validate_ticket(
        &self,
        ticket: &ChangeTicket,
        ring: &RingName,
    ) -> Result<TicketVerdict, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyntheticResult {
    pub status: SyntheticStatus,
    pub captured_at_epoch_seconds: u64,
}

pub trait Telemetry: Send + Sync {
    /// `None` when no synthetic check has ever reported for `ring`.
    fn latest_synthetic_result(
        &self,
        ring: &RingName,
    ) -> Result<Option<SyntheticResult>, CollaboratorError>;
}

/// Pushes a policy set to one ring. Repeating a call with identical
/// arguments must be safe.
pub trait ApplyBackend: Send + Sync {
    fn apply(&self, set: &PolicySet, ring: &RingName) -> Result<(), CollaboratorError>;
}

// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Ring promotion: the gate evaluator, collaborator contracts, the
//! promotion controller state machine and rollback.

mod apply;
mod collaborators;
mod config;
mod controller;
mod error;
pub mod gate;
mod local;
mod locks;
mod rollback;

pub use apply::ApplyFailure;
pub use collaborators::{
    ApplyBackend, ChangeControl, CollaboratorError, InventoryCollector, SyntheticResult,
    SyntheticStatus, Telemetry,
};
pub use config::{config_search_paths, FleetConfig, DEFAULT_POLICY_DIR, FLEET_DIR_NAME};
pub use controller::{Collaborators, PromotionController, PromotionRequest, DEFAULT_APPLY_TIMEOUT};
pub use error::{PromotionError, PromotionErrorCode};
pub use gate::{evaluate, GateDecision, GateFacts, GateRejection, GateRule, TicketCheck};
pub use local::{
    FileInventoryCollector, FileTelemetry, FormatOnlyChangeControl, LocalFleet, NoTelemetry,
    RegisterChangeControl,
};
pub use locks::KeyedLocks;
pub use rollback::RollbackManager;

pub const CRATE_NAME: &str = "bijux-fleet-promotion";

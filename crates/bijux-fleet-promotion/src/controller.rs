// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use bijux_fleet_core::{ClockPort, Hash256};
use bijux_fleet_drift::diff_managed;
use bijux_fleet_model::{
    ActualStateSnapshot, AuditAction, AuditDraft, AuditResult, ChangeTicket, DesiredState,
    DriftReport, EmergencyOverride, LkgEntry, PolicySet, PromotionAttempt, PromotionState,
    Rejection, RejectionKind, Ring, RingCatalog, RingName, TicketVerdict,
};
use bijux_fleet_store::FleetState;
use tracing::{info, warn};

use crate::apply::apply_with_timeout;
use crate::collaborators::{
    ApplyBackend, ChangeControl, CollaboratorError, InventoryCollector, Telemetry,
};
use crate::error::{PromotionError, PromotionErrorCode};
use crate::gate::{evaluate, GateDecision, GateFacts, TicketCheck};
use crate::locks::KeyedLocks;

pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// One request to move a policy set into a ring.
#[derive(Debug, Clone)]
pub struct PromotionRequest {
    pub policy_set: PolicySet,
    pub ring: RingName,
    pub change_ticket: Option<String>,
    pub actor: String,
    pub emergency_override: Option<EmergencyOverride>,
    pub apply_timeout: Duration,
}

impl PromotionRequest {
    #[must_use]
    pub fn new(policy_set: PolicySet, ring: RingName, actor: &str) -> Self {
        Self {
            policy_set,
            ring,
            change_ticket: None,
            actor: actor.to_string(),
            emergency_override: None,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_change_ticket(mut self, ticket: &str) -> Self {
        self.change_ticket = Some(ticket.to_string());
        self
    }

    #[must_use]
    pub fn with_emergency_override(mut self, reason: &str) -> Self {
        self.emergency_override = Some(EmergencyOverride {
            reason: reason.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }
}

/// The external systems one controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryCollector>,
    pub change_control: Arc<dyn ChangeControl>,
    pub telemetry: Arc<dyn Telemetry>,
    pub apply: Arc<dyn ApplyBackend>,
}

/// Drives promotion attempts through
/// `Requested -> Validating -> Gated -> Applying -> Applied`, rejecting at
/// the first failed step. All state lives in `FleetState`; the controller
/// holds only locks.
pub struct PromotionController {
    state: Arc<FleetState>,
    catalog: RingCatalog,
    collaborators: Collaborators,
    clock: Arc<dyn ClockPort>,
    locks: KeyedLocks,
}

impl PromotionController {
    #[must_use]
    pub fn new(
        state: Arc<FleetState>,
        catalog: RingCatalog,
        collaborators: Collaborators,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            state,
            catalog,
            collaborators,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &RingCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn state(&self) -> &FleetState {
        &self.state
    }

    /// Hash of the ring's last-known-good policy set.
    pub fn last_good(&self, ring: &RingName) -> Result<Option<Hash256>, PromotionError> {
        self.ring(ring)?;
        Ok(self.state.lkg.current(ring)?.map(|e| e.policy_set_hash))
    }

    /// Runs one attempt to completion. Gate, sequencing, collector and apply
    /// failures come back as a `Rejected` attempt; `Err` means the attempt
    /// could not be driven (unknown ring, state store failure).
    pub fn promote(&self, request: PromotionRequest) -> Result<PromotionAttempt, PromotionError> {
        let ring = self.ring(&request.ring)?;
        self.state.audit.ensure_appendable()?;
        let hash = request.policy_set.hash();
        let set_lock = self.locks.policy_set(hash)?;
        let _set_guard = set_lock
            .lock()
            .map_err(|_| PromotionError::internal("policy set lock poisoned"))?;

        let id = self.state.attempts.allocate_id()?;
        let mut attempt = PromotionAttempt::new(
            id,
            hash,
            ring.name.clone(),
            request.change_ticket.clone(),
            &request.actor,
            self.clock.now_epoch_seconds(),
        );
        attempt.emergency_override = request.emergency_override.clone();
        self.state.attempts.put(&attempt)?;
        info!(
            attempt_id = %attempt.id,
            ring = %ring.name,
            policy_set = %hash,
            "promotion requested"
        );

        self.advance(&mut attempt, PromotionState::Validating)?;
        if let Some(rejection) = self.validate_scope(&request.policy_set, &ring) {
            return self.finish_rejected(attempt, rejection, AuditAction::Validate);
        }
        let snapshot = match self
            .collaborators
            .inventory
            .fetch_actual_state(ring.name.as_str())
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return self.finish_rejected(
                    attempt,
                    unavailable("inventory-unavailable", &err),
                    AuditAction::Validate,
                )
            }
        };
        let report = self.preexisting_drift(&ring, &snapshot)?;
        self.audit(
            self.draft(&attempt, &attempt.actor, AuditAction::Validate, AuditResult::Ok).detail(
                format!(
                    "drift_entries={} baseline={}",
                    report.entries.len(),
                    report
                        .policy_set_hash
                        .map_or_else(|| "none".to_string(), |h| h.to_string())
                ),
            ),
        )?;

        self.advance(&mut attempt, PromotionState::Gated)?;
        let override_requested = request.emergency_override.is_some();
        let ticket_required_by = request
            .policy_set
            .documents()
            .find(|d| {
                d.applies_to_ring(&ring.name) && d.metadata.change_ticket_required == Some(true)
            })
            .map(|d| &d.id);
        let needs_ticket =
            ring.required_gates.change_ticket || override_requested || ticket_required_by.is_some();
        // Collaborator errors are gate facts, ordered with the other rules.
        let (ticket, ticket_outage) = match request.change_ticket.as_deref() {
            Some(raw) if needs_ticket => match self.check_ticket(raw, &ring.name) {
                Ok(check) => (Some(check), None),
                Err(err) => (None, Some(err.to_string())),
            },
            _ => (None, None),
        };
        let (telemetry, telemetry_outage) = if ring.required_gates.telemetry {
            match self.collaborators.telemetry.latest_synthetic_result(&ring.name) {
                Ok(result) => (result, None),
                Err(err) => (None, Some(err.to_string())),
            }
        } else {
            (None, None)
        };
        let decision = evaluate(&GateFacts {
            report: &report,
            ring: &ring,
            ticket: ticket.as_ref(),
            ticket_required_by,
            ticket_outage: ticket_outage.as_deref(),
            telemetry,
            telemetry_outage: telemetry_outage.as_deref(),
            now_epoch_seconds: self.clock.now_epoch_seconds(),
            emergency_override: override_requested,
        });
        if let GateDecision::Reject(rejection) = decision {
            let kind = if rejection.rule.is_outage() {
                RejectionKind::CollectorUnavailable
            } else {
                RejectionKind::GateRejected
            };
            return self.finish_rejected(
                attempt,
                Rejection::new(kind, rejection.rule.as_str(), &rejection.reason),
                AuditAction::GateCheck,
            );
        }

        // Sequencing is read and acted on under the ring lock so two
        // promotions into one ring cannot interleave.
        let ring_lock = self.locks.ring(&ring.name)?;
        let _ring_guard = ring_lock
            .lock()
            .map_err(|_| PromotionError::internal("ring lock poisoned"))?;
        let bypass = match &request.emergency_override {
            Some(EmergencyOverride { reason }) => {
                warn!(
                    attempt_id = %attempt.id,
                    ring = %ring.name,
                    reason = %reason,
                    "ring sequencing bypassed by emergency override"
                );
                format!(" sequencing_bypass={reason}")
            }
            None => {
                if let Some(gap) = self.sequencing_gap(&ring, hash)? {
                    return self.finish_rejected(
                        attempt,
                        Rejection::new(RejectionKind::SequencingError, "sequencing", &gap),
                        AuditAction::GateCheck,
                    );
                }
                String::new()
            }
        };
        self.audit(
            self.draft(&attempt, &attempt.actor, AuditAction::GateCheck, AuditResult::Ok)
                .detail(format!("approved{bypass}")),
        )?;

        self.state.archive.put(&request.policy_set)?;
        self.advance(&mut attempt, PromotionState::Applying)?;
        if let Err(failure) = apply_with_timeout(
            &self.collaborators.apply,
            &request.policy_set,
            &ring.name,
            request.apply_timeout,
        ) {
            return self.finish_rejected(
                attempt,
                Rejection::new(RejectionKind::ApplyError, failure.reason(), &failure.to_string()),
                AuditAction::Apply,
            );
        }
        // Audited before last-known-good moves or the attempt turns Applied.
        self.audit(
            self.draft(&attempt, &attempt.actor, AuditAction::Apply, AuditResult::Ok)
                .detail(format!("applied{bypass}")),
        )?;
        self.state.lkg.record_applied(
            &ring.name,
            LkgEntry {
                policy_set_hash: hash,
                attempt_id: attempt.id.clone(),
                applied_at_epoch_seconds: self.clock.now_epoch_seconds(),
            },
        )?;
        self.advance(&mut attempt, PromotionState::Applied)?;
        info!(
            attempt_id = %attempt.id,
            ring = %ring.name,
            policy_set = %hash,
            outcome = attempt.outcome().as_str(),
            "promotion applied"
        );
        Ok(attempt)
    }

    /// Re-applies the ring's previous last-known-good set and marks the
    /// attempt that produced the current one as rolled back.
    pub(crate) fn roll_back(
        &self,
        ring: &RingName,
        actor: &str,
        timeout: Duration,
    ) -> Result<PromotionAttempt, PromotionError> {
        let ring = self.ring(ring)?;
        self.state.audit.ensure_appendable()?;
        let ring_lock = self.locks.ring(&ring.name)?;
        let _ring_guard = ring_lock
            .lock()
            .map_err(|_| PromotionError::internal("ring lock poisoned"))?;

        let table = self.state.lkg.snapshot()?;
        let (Some(current), Some(previous)) = (
            table.current(&ring.name).cloned(),
            table.previous(&ring.name).cloned(),
        ) else {
            return Err(PromotionError::new(
                PromotionErrorCode::NoPriorState,
                format!("ring {} has no prior applied policy set to restore", ring.name),
            ));
        };
        let mut attempt = self.state.attempts.get(&current.attempt_id)?.ok_or_else(|| {
            PromotionError::internal(format!(
                "attempt {} recorded as last-known-good for ring {} is missing",
                current.attempt_id, ring.name
            ))
        })?;
        let restore = self.state.archive.get(previous.policy_set_hash)?;

        self.advance(&mut attempt, PromotionState::RollingBack)?;
        match apply_with_timeout(&self.collaborators.apply, &restore, &ring.name, timeout) {
            Ok(()) => {
                self.state.lkg.pop(&ring.name)?;
                attempt.restored_policy_set = Some(previous.policy_set_hash);
                self.advance(&mut attempt, PromotionState::RolledBack)?;
                self.audit(
                    self.draft(&attempt, actor, AuditAction::Rollback, AuditResult::Ok)
                        .policy_set(previous.policy_set_hash)
                        .detail(format!(
                            "restored {} replacing {}",
                            previous.policy_set_hash, current.policy_set_hash
                        )),
                )?;
                info!(
                    attempt_id = %attempt.id,
                    ring = %ring.name,
                    policy_set = %previous.policy_set_hash,
                    outcome = attempt.outcome().as_str(),
                    "ring rolled back"
                );
                Ok(attempt)
            }
            Err(failure) => {
                self.advance(&mut attempt, PromotionState::Applied)?;
                self.audit(
                    self.draft(&attempt, actor, AuditAction::Rollback, AuditResult::Failed)
                        .policy_set(previous.policy_set_hash)
                        .detail(format!("{}: {failure}", failure.reason())),
                )?;
                warn!(
                    attempt_id = %attempt.id,
                    ring = %ring.name,
                    reason = failure.reason(),
                    "rollback failed; ring left on current policy set"
                );
                Err(PromotionError::new(
                    PromotionErrorCode::ApplyError,
                    format!("rollback of ring {} failed: {failure}", ring.name),
                ))
            }
        }
    }

    fn ring(&self, name: &RingName) -> Result<Ring, PromotionError> {
        self.catalog.get(name).cloned().ok_or_else(|| {
            PromotionError::new(
                PromotionErrorCode::UnknownRing,
                format!(
                    "unknown ring `{name}` (known: {})",
                    self.catalog
                        .names()
                        .iter()
                        .map(RingName::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })
    }

    fn validate_scope(&self, set: &PolicySet, ring: &Ring) -> Option<Rejection> {
        for doc in set.documents() {
            let unknown = doc
                .scope
                .iter()
                .flat_map(|s| s.supported_rings.iter())
                .find(|r| !self.catalog.contains(r));
            if let Some(unknown) = unknown {
                return Some(Rejection::new(
                    RejectionKind::InvalidPolicySet,
                    "unknown-scope-ring",
                    &format!("policy {} is scoped to unknown ring {unknown}", doc.id),
                ));
            }
        }
        if DesiredState::for_ring(set, &ring.name).is_empty() {
            return Some(Rejection::new(
                RejectionKind::InvalidPolicySet,
                "empty-ring-view",
                &format!(
                    "no document in policy set {} applies to ring {}",
                    set.hash(),
                    ring.name
                ),
            ));
        }
        None
    }

    /// Drift between what the ring last had applied and what it reports
    /// now. A ring with nothing applied has nothing under management.
    fn preexisting_drift(
        &self,
        ring: &Ring,
        snapshot: &ActualStateSnapshot,
    ) -> Result<DriftReport, PromotionError> {
        match self.state.lkg.current(&ring.name)? {
            Some(entry) => {
                let applied = self.state.archive.get(entry.policy_set_hash)?;
                Ok(diff_managed(
                    &DesiredState::for_ring(&applied, &ring.name),
                    snapshot,
                    Some(entry.policy_set_hash),
                ))
            }
            None => Ok(diff_managed(&DesiredState::default(), snapshot, None)),
        }
    }

    fn check_ticket(&self, raw: &str, ring: &RingName) -> Result<TicketCheck, CollaboratorError> {
        let verdict = match ChangeTicket::parse(raw) {
            Ok(ticket) => self
                .collaborators
                .change_control
                .validate_ticket(&ticket, ring)?,
            Err(err) => TicketVerdict::invalid(err.0),
        };
        Ok(TicketCheck {
            id: raw.to_string(),
            verdict,
        })
    }

    /// First lower ring whose last-known-good is not `hash`.
    fn sequencing_gap(&self, ring: &Ring, hash: Hash256) -> Result<Option<String>, PromotionError> {
        let table = self.state.lkg.snapshot()?;
        for lower in self.catalog.lower_rings(ring) {
            let current = table.current(&lower.name).map(|e| e.policy_set_hash);
            if current != Some(hash) {
                return Ok(Some(format!(
                    "policy set {hash} must clear ring {} (rank {}) before ring {} (rank {}); it holds {}",
                    lower.name,
                    lower.rank,
                    ring.name,
                    ring.rank,
                    current.map_or_else(|| "nothing".to_string(), |h| h.to_string())
                )));
            }
        }
        Ok(None)
    }

    fn advance(
        &self,
        attempt: &mut PromotionAttempt,
        next: PromotionState,
    ) -> Result<(), PromotionError> {
        attempt.transition(next, self.clock.now_epoch_seconds())?;
        self.state.attempts.put(attempt)?;
        Ok(())
    }

    fn finish_rejected(
        &self,
        mut attempt: PromotionAttempt,
        rejection: Rejection,
        action: AuditAction,
    ) -> Result<PromotionAttempt, PromotionError> {
        let result = if action == AuditAction::Apply {
            AuditResult::Failed
        } else {
            AuditResult::Rejected
        };
        let detail = format!(
            "{}{{{}}}: {}",
            rejection.kind.as_str(),
            rejection.reason,
            rejection.detail
        );
        warn!(
            attempt_id = %attempt.id,
            ring = %attempt.ring,
            policy_set = %attempt.policy_set_hash,
            kind = rejection.kind.as_str(),
            reason = %rejection.reason,
            "promotion rejected"
        );
        attempt.reject(rejection, self.clock.now_epoch_seconds())?;
        self.state.attempts.put(&attempt)?;
        self.audit(self.draft(&attempt, &attempt.actor, action, result).detail(detail))?;
        Ok(attempt)
    }

    fn draft(
        &self,
        attempt: &PromotionAttempt,
        actor: &str,
        action: AuditAction,
        result: AuditResult,
    ) -> AuditDraft {
        AuditDraft::new(action, result, actor, self.clock.now_epoch_seconds())
            .policy_set(attempt.policy_set_hash)
            .ring(&attempt.ring)
            .attempt(&attempt.id)
    }

    fn audit(&self, draft: AuditDraft) -> Result<(), PromotionError> {
        self.state.audit.append(draft)?;
        Ok(())
    }
}

fn unavailable(reason: &str, err: &CollaboratorError) -> Rejection {
    Rejection::new(RejectionKind::CollectorUnavailable, reason, &err.to_string())
}

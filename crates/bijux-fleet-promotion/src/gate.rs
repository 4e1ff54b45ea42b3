// SPDX-License-Identifier: Apache-2.0

//! Gate Evaluator: a pure decision over facts the controller gathered.

use std::fmt::{Display, Formatter};

use bijux_fleet_model::{DriftReport, PolicyId, Ring, TicketVerdict};
use serde::Serialize;

use crate::collaborators::{SyntheticResult, SyntheticStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateRule {
    DriftPresent,
    TicketRequired,
    ChangeControlUnavailable,
    TicketInvalid,
    TelemetryUnavailable,
    TelemetryMissing,
    TelemetryFailing,
    TelemetryStale,
}

impl GateRule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DriftPresent => "drift-present",
            Self::TicketRequired => "ticket-required",
            Self::ChangeControlUnavailable => "change-control-unavailable",
            Self::TicketInvalid => "ticket-invalid",
            Self::TelemetryUnavailable => "telemetry-unavailable",
            Self::TelemetryMissing => "telemetry-missing",
            Self::TelemetryFailing => "telemetry-failing",
            Self::TelemetryStale => "telemetry-stale",
        }
    }

    /// The rule could not be decided because a collaborator was down.
    #[must_use]
    pub const fn is_outage(self) -> bool {
        matches!(
            self,
            Self::ChangeControlUnavailable | Self::TelemetryUnavailable
        )
    }
}

impl Display for GateRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket as seen by the gate: the raw id plus change control's verdict
/// (or the format check's, for malformed ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCheck {
    pub id: String,
    pub verdict: TicketVerdict,
}

#[derive(Debug, Clone, Copy)]
pub struct GateFacts<'a> {
    pub report: &'a DriftReport,
    pub ring: &'a Ring,
    pub ticket: Option<&'a TicketCheck>,
    /// First document in the ring view that sets `change_ticket_required`.
    pub ticket_required_by: Option<&'a PolicyId>,
    /// Change control failed while checking `ticket`.
    pub ticket_outage: Option<&'a str>,
    pub telemetry: Option<SyntheticResult>,
    /// Telemetry failed to answer.
    pub telemetry_outage: Option<&'a str>,
    pub now_epoch_seconds: u64,
    /// An emergency override makes the ticket rule mandatory on every ring.
    pub emergency_override: bool,
}

impl GateFacts<'_> {
    #[must_use]
    pub fn ticket_required(&self) -> bool {
        self.ring.required_gates.change_ticket
            || self.emergency_override
            || self.ticket_required_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateRejection {
    pub rule: GateRule,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Approve,
    Reject(GateRejection),
}

impl GateDecision {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

struct GateRuleSpec {
    id: &'static str,
    check: fn(&GateFacts<'_>) -> Option<GateRejection>,
}

/// Evaluated in order; the first failing rule is the decision.
const GATE_RULES: &[GateRuleSpec] = &[
    GateRuleSpec {
        id: "gate.drift",
        check: check_drift,
    },
    GateRuleSpec {
        id: "gate.change_ticket",
        check: check_ticket,
    },
    GateRuleSpec {
        id: "gate.telemetry",
        check: check_telemetry,
    },
];

#[must_use]
pub fn evaluate(facts: &GateFacts<'_>) -> GateDecision {
    GATE_RULES
        .iter()
        .find_map(|rule| (rule.check)(facts))
        .map_or(GateDecision::Approve, GateDecision::Reject)
}

/// Rule ids in evaluation order.
#[must_use]
pub fn rule_ids() -> Vec<&'static str> {
    GATE_RULES.iter().map(|r| r.id).collect()
}

fn reject(rule: GateRule, reason: String) -> Option<GateRejection> {
    Some(GateRejection { rule, reason })
}

fn check_drift(facts: &GateFacts<'_>) -> Option<GateRejection> {
    if facts.report.is_clean() || facts.ring.tolerate_drift {
        return None;
    }
    let keys: Vec<String> = facts
        .report
        .entries
        .iter()
        .map(|e| format!("{}({})", e.key(), e.status.as_str()))
        .collect();
    reject(
        GateRule::DriftPresent,
        format!(
            "ring {} has {} drift entries: {}",
            facts.ring.name,
            keys.len(),
            keys.join(", ")
        ),
    )
}

fn check_ticket(facts: &GateFacts<'_>) -> Option<GateRejection> {
    if !facts.ticket_required() {
        return None;
    }
    if let Some(outage) = facts.ticket_outage {
        return reject(
            GateRule::ChangeControlUnavailable,
            format!("change control unavailable: {outage}"),
        );
    }
    let Some(ticket) = facts.ticket else {
        let reason = if facts.emergency_override {
            "emergency override requires a change ticket".to_string()
        } else if facts.ring.required_gates.change_ticket {
            format!("ring {} requires a change ticket", facts.ring.name)
        } else {
            match facts.ticket_required_by {
                Some(id) => format!("policy {id} sets change_ticket_required"),
                None => format!("ring {} requires a change ticket", facts.ring.name),
            }
        };
        return reject(GateRule::TicketRequired, reason);
    };
    match &ticket.verdict {
        TicketVerdict::Valid => None,
        TicketVerdict::Invalid { reason } => reject(
            GateRule::TicketInvalid,
            format!("change ticket {} rejected: {reason}", ticket.id),
        ),
    }
}

fn check_telemetry(facts: &GateFacts<'_>) -> Option<GateRejection> {
    if !facts.ring.required_gates.telemetry {
        return None;
    }
    if let Some(outage) = facts.telemetry_outage {
        return reject(
            GateRule::TelemetryUnavailable,
            format!("telemetry unavailable for ring {}: {outage}", facts.ring.name),
        );
    }
    let Some(result) = facts.telemetry else {
        return reject(
            GateRule::TelemetryMissing,
            format!("no synthetic check result for ring {}", facts.ring.name),
        );
    };
    if result.status == SyntheticStatus::Fail {
        return reject(
            GateRule::TelemetryFailing,
            format!("latest synthetic check for ring {} is failing", facts.ring.name),
        );
    }
    let age = facts
        .now_epoch_seconds
        .saturating_sub(result.captured_at_epoch_seconds);
    if age > facts.ring.telemetry_freshness_secs {
        return reject(
            GateRule::TelemetryStale,
            format!(
                "synthetic check for ring {} is {age}s old (limit {}s)",
                facts.ring.name, facts.ring.telemetry_freshness_secs
            ),
        );
    }
    None
}

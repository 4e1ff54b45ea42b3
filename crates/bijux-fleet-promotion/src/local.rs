// SPDX-License-Identifier: Apache-2.0

//! File-backed collaborators for single-host use and tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bijux_fleet_core::ClockPort;
use bijux_fleet_model::{
    ActualStateSnapshot, ChangeTicket, DesiredState, PolicySet, RingName, TicketVerdict,
};
use bijux_fleet_store::write_atomic;
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::{
    ApplyBackend, ChangeControl, CollaboratorError, InventoryCollector, SyntheticResult, Telemetry,
};

fn read_optional(path: &Path, collaborator: &'static str) -> Result<Option<Vec<u8>>, CollaboratorError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CollaboratorError::new(
            collaborator,
            format!("read {}: {e}", path.display()),
        )),
    }
}

/// A fleet simulated as one `<ring>.json` snapshot per ring. Serves as both
/// the apply backend and the inventory collector.
pub struct LocalFleet {
    root: PathBuf,
    clock: Arc<dyn ClockPort>,
}

impl LocalFleet {
    #[must_use]
    pub fn new(root: &Path, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            root: root.to_path_buf(),
            clock,
        }
    }

    #[must_use]
    pub fn ring_path(&self, ring: &str) -> PathBuf {
        self.root.join(format!("{ring}.json"))
    }

    fn read_ring(&self, ring: &str) -> Result<Option<ActualStateSnapshot>, CollaboratorError> {
        let Some(bytes) = read_optional(&self.ring_path(ring), "inventory")? else {
            return Ok(None);
        };
        ActualStateSnapshot::parse_snapshot_json(&bytes, ring)
            .map(Some)
            .map_err(|e| CollaboratorError::new("inventory", format!("ring {ring}: {e}")))
    }
}

impl InventoryCollector for LocalFleet {
    /// A ring that has never been applied to reports no policies.
    fn fetch_actual_state(&self, selector: &str) -> Result<ActualStateSnapshot, CollaboratorError> {
        Ok(self.read_ring(selector)?.unwrap_or_else(|| {
            ActualStateSnapshot::new(selector, self.clock.now_epoch_seconds(), BTreeMap::new())
        }))
    }
}

impl ApplyBackend for LocalFleet {
    fn apply(&self, set: &PolicySet, ring: &RingName) -> Result<(), CollaboratorError> {
        let desired = DesiredState::for_ring(set, ring);
        if let Some(existing) = self.read_ring(ring.as_str())? {
            if &existing.policies == desired.policies() {
                debug!(ring = %ring, policy_set = %set.hash(), "ring already in desired state");
                return Ok(());
            }
        }
        let snapshot =
            ActualStateSnapshot::from_desired(&desired, ring.as_str(), self.clock.now_epoch_seconds());
        let mut bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CollaboratorError::new("apply", e.to_string()))?;
        bytes.push(b'\n');
        write_atomic(&self.ring_path(ring.as_str()), &bytes)
            .map_err(|e| CollaboratorError::new("apply", e.to_string()))
    }
}

/// Serves one fixed snapshot file regardless of ring.
#[derive(Debug, Clone)]
pub struct FileInventoryCollector {
    path: PathBuf,
}

impl FileInventoryCollector {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl InventoryCollector for FileInventoryCollector {
    fn fetch_actual_state(&self, selector: &str) -> Result<ActualStateSnapshot, CollaboratorError> {
        let bytes = fs::read(&self.path).map_err(|e| {
            CollaboratorError::new("inventory", format!("read {}: {e}", self.path.display()))
        })?;
        ActualStateSnapshot::parse_snapshot_json(&bytes, selector)
            .map_err(|e| CollaboratorError::new("inventory", e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TicketRegister {
    tickets: Vec<RegisteredTicket>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisteredTicket {
    id: String,
    /// Empty means every ring.
    #[serde(default)]
    rings: Vec<RingName>,
    approved: bool,
}

/// Approved-ticket register, re-read on every lookup.
#[derive(Debug, Clone)]
pub struct RegisterChangeControl {
    path: PathBuf,
}

impl RegisterChangeControl {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ChangeControl for RegisterChangeControl {
    fn validate_ticket(
        &self,
        ticket: &ChangeTicket,
        ring: &RingName,
    ) -> Result<TicketVerdict, CollaboratorError> {
        let bytes = fs::read(&self.path).map_err(|e| {
            CollaboratorError::new("change-control", format!("read {}: {e}", self.path.display()))
        })?;
        let register: TicketRegister = serde_json::from_slice(&bytes).map_err(|e| {
            CollaboratorError::new("change-control", format!("{}: {e}", self.path.display()))
        })?;
        let Some(entry) = register.tickets.iter().find(|t| t.id == ticket.as_str()) else {
            return Ok(TicketVerdict::invalid(format!("{ticket} is not in the change register")));
        };
        if !entry.approved {
            return Ok(TicketVerdict::invalid(format!("{ticket} is not approved")));
        }
        if !entry.rings.is_empty() && !entry.rings.contains(ring) {
            return Ok(TicketVerdict::invalid(format!(
                "{ticket} is not approved for ring {ring}"
            )));
        }
        Ok(TicketVerdict::Valid)
    }
}

/// Accepts every well-formed ticket. Used when no register is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOnlyChangeControl;

impl ChangeControl for FormatOnlyChangeControl {
    fn validate_ticket(
        &self,
        _ticket: &ChangeTicket,
        _ring: &RingName,
    ) -> Result<TicketVerdict, CollaboratorError> {
        Ok(TicketVerdict::Valid)
    }
}

/// Synthetic results keyed by ring name.
#[derive(Debug, Clone)]
pub struct FileTelemetry {
    path: PathBuf,
}

impl FileTelemetry {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Telemetry for FileTelemetry {
    fn latest_synthetic_result(
        &self,
        ring: &RingName,
    ) -> Result<Option<SyntheticResult>, CollaboratorError> {
        let bytes = fs::read(&self.path).map_err(|e| {
            CollaboratorError::new("telemetry", format!("read {}: {e}", self.path.display()))
        })?;
        let results: BTreeMap<RingName, SyntheticResult> = serde_json::from_slice(&bytes)
            .map_err(|e| CollaboratorError::new("telemetry", format!("{}: {e}", self.path.display())))?;
        Ok(results.get(ring).copied())
    }
}

/// No telemetry source configured: every ring reports no result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl Telemetry for NoTelemetry {
    fn latest_synthetic_result(
        &self,
        _ring: &RingName,
    ) -> Result<Option<SyntheticResult>, CollaboratorError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FileTelemetry, FormatOnlyChangeControl, LocalFleet, RegisterChangeControl,
    };
    use crate::collaborators::{
        ApplyBackend, ChangeControl, InventoryCollector, SyntheticStatus, Telemetry,
    };
    use bijux_fleet_core::FixedClock;
    use bijux_fleet_model::{
        ChangeTicket, Platform, PolicyDocument, PolicyId, PolicyMetadata, PolicySet, RingName,
        RiskTier, TicketVerdict,
    };
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Arc;

    fn set() -> PolicySet {
        let mut body = BTreeMap::new();
        body.insert("timeout".to_string(), json!(300));
        PolicySet::new(vec![PolicyDocument::new(
            PolicyId::new("fw-baseline").expect("id"),
            Platform::Windows,
            "1.0.0",
            PolicyMetadata::new("secops", RiskTier::Low),
            body,
        )])
        .expect("set")
    }

    #[test]
    fn local_fleet_apply_is_idempotent_and_observable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let qa = RingName::new("qa").expect("ring");
        let fleet = LocalFleet::new(dir.path(), Arc::new(FixedClock(50)));
        let before = fleet.fetch_actual_state("qa").expect("empty ring");
        assert!(before.policies.is_empty());

        fleet.apply(&set(), &qa).expect("apply");
        let first = fs::read(fleet.ring_path("qa")).expect("ring file");
        let later = LocalFleet::new(dir.path(), Arc::new(FixedClock(99)));
        later.apply(&set(), &qa).expect("re-apply");
        assert_eq!(fs::read(later.ring_path("qa")).expect("ring file"), first);

        let observed = later.fetch_actual_state("qa").expect("snapshot");
        assert_eq!(observed.captured_at_epoch_seconds, 50);
        assert_eq!(observed.policies.len(), 1);
    }

    #[test]
    fn register_checks_approval_and_ring() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tickets.json");
        fs::write(
            &path,
            r#"{"tickets":[
                {"id":"CAB-100","rings":["security","global"],"approved":true},
                {"id":"CAB-200","approved":false},
                {"id":"CAB-300","approved":true}
            ]}"#,
        )
        .expect("write register");
        let control = RegisterChangeControl::new(&path);
        let check = |id: &str, ring: &str| {
            control
                .validate_ticket(
                    &ChangeTicket::parse(id).expect("ticket"),
                    &RingName::new(ring).expect("ring"),
                )
                .expect("verdict")
        };
        assert_eq!(check("CAB-100", "security"), TicketVerdict::Valid);
        assert!(!check("CAB-100", "early").is_valid());
        assert!(!check("CAB-200", "security").is_valid());
        assert_eq!(check("CAB-300", "early"), TicketVerdict::Valid);
        assert!(!check("CAB-999", "qa").is_valid());

        let missing = RegisterChangeControl::new(&dir.path().join("absent.json"));
        assert!(missing
            .validate_ticket(
                &ChangeTicket::parse("CAB-100").expect("ticket"),
                &RingName::new("qa").expect("ring")
            )
            .is_err());
        assert!(FormatOnlyChangeControl
            .validate_ticket(
                &ChangeTicket::parse("CAB-1").expect("ticket"),
                &RingName::new("qa").expect("ring")
            )
            .expect("verdict")
            .is_valid());
    }

    #[test]
    fn telemetry_file_reports_per_ring() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("synthetics.json");
        fs::write(
            &path,
            r#"{"early":{"status":"pass","captured_at_epoch_seconds":10}}"#,
        )
        .expect("write telemetry");
        let telemetry = FileTelemetry::new(&path);
        let early = telemetry
            .latest_synthetic_result(&RingName::new("early").expect("ring"))
            .expect("result")
            .expect("present");
        assert_eq!(early.status, SyntheticStatus::Pass);
        assert!(telemetry
            .latest_synthetic_result(&RingName::new("global").expect("ring"))
            .expect("result")
            .is_none());
    }
}

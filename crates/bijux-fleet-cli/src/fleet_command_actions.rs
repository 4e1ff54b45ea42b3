// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bijux_fleet_core::{ClockPort, SystemClock};
use bijux_fleet_drift::{diff, diff_desired};
use bijux_fleet_model::{
    ActualStateSnapshot, DesiredState, DriftStatus, PolicySet, PromotionAttempt, PromotionState,
    RingName,
};
use bijux_fleet_promotion::{
    ChangeControl, Collaborators, FileInventoryCollector, FileTelemetry, FleetConfig,
    FormatOnlyChangeControl, InventoryCollector, LocalFleet, NoTelemetry, PromotionController,
    PromotionRequest, RegisterChangeControl, RollbackManager, Telemetry,
};
use bijux_fleet_store::{AuditLog, FleetState, StateLockGuard, StatePaths};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::command_output_adapters::emit_ok;
use crate::commands::AuditCommand;
use crate::{CliError, OutputMode};

pub(crate) struct PromoteArgs {
    pub(crate) ring: String,
    pub(crate) change_id: Option<String>,
    pub(crate) policies: Option<PathBuf>,
    pub(crate) actual: Option<PathBuf>,
    pub(crate) override_reason: Option<String>,
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|e| CliError::internal(e.to_string()))
}

fn emit(output_mode: OutputMode, payload: Value) -> Result<(), CliError> {
    emit_ok(output_mode, payload).map_err(CliError::internal)
}

fn load_policy_set(config: &FleetConfig, dir: &Path) -> Result<PolicySet, CliError> {
    bijux_fleet_policies::load(&[dir.to_path_buf()], &config.policy_store_config())
        .map_err(CliError::from)
}

fn parse_ring(name: &str) -> Result<RingName, CliError> {
    RingName::new(name).map_err(|e| CliError::usage(&e.0))
}

fn known_ring(config: &FleetConfig, name: &str) -> Result<RingName, CliError> {
    let ring = parse_ring(name)?;
    if config.rings.contains(&ring) {
        return Ok(ring);
    }
    let known: Vec<String> = config
        .rings
        .iter()
        .map(|r| r.name.as_str().to_string())
        .collect();
    Err(CliError::usage(&format!(
        "unknown ring `{name}`; known rings: {}",
        known.join(", ")
    )))
}

fn build_controller(
    config: &FleetConfig,
    actual: Option<&Path>,
) -> Result<PromotionController, CliError> {
    let state = Arc::new(FleetState::open(&config.state_dir)?);
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);
    let fleet = Arc::new(LocalFleet::new(&config.fleet_dir, Arc::clone(&clock)));
    let inventory: Arc<dyn InventoryCollector> = match actual {
        Some(path) => Arc::new(FileInventoryCollector::new(path)),
        None => Arc::clone(&fleet) as Arc<dyn InventoryCollector>,
    };
    let change_control: Arc<dyn ChangeControl> = match &config.change_tickets {
        Some(path) => Arc::new(RegisterChangeControl::new(path)),
        None => Arc::new(FormatOnlyChangeControl),
    };
    let telemetry: Arc<dyn Telemetry> = match &config.telemetry {
        Some(path) => Arc::new(FileTelemetry::new(path)),
        None => Arc::new(NoTelemetry),
    };
    Ok(PromotionController::new(
        state,
        config.rings.clone(),
        Collaborators {
            inventory,
            change_control,
            telemetry,
            apply: fleet,
        },
        clock,
    ))
}

fn attempt_payload(command: &str, attempt: &PromotionAttempt) -> Result<Value, CliError> {
    Ok(json!({
        "command": command,
        "status": attempt.state.as_str(),
        "attempt": to_value(attempt)?,
    }))
}

pub(crate) fn validate(
    config: &FleetConfig,
    policy_dir: &Path,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let set = load_policy_set(config, policy_dir)?;
    emit(
        output_mode,
        json!({
            "command": "validate",
            "status": "ok",
            "policy_dir": policy_dir,
            "documents": set.len(),
            "policy_set_hash": set.hash().to_string(),
        }),
    )
}

pub(crate) fn hash(
    config: &FleetConfig,
    policy_dir: &Path,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let set = load_policy_set(config, policy_dir)?;
    emit(
        output_mode,
        json!({
            "command": "hash",
            "policy_set_hash": set.hash().to_string(),
            "policies": set.documents().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        }),
    )
}

/// Prints every drift entry, then fails with exit 3 when any exist.
pub(crate) fn drift_check(
    config: &FleetConfig,
    desired: &Path,
    actual: &Path,
    ring: Option<&str>,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let set = load_policy_set(config, desired)?;
    let ring = ring.map(|name| known_ring(config, name)).transpose()?;
    let bytes = fs::read(actual).map_err(|e| {
        CliError::dependency(format!("failed to read snapshot {}: {e}", actual.display()))
    })?;
    let selector = ring.as_ref().map_or("fleet", RingName::as_str);
    let snapshot = ActualStateSnapshot::parse_snapshot_json(&bytes, selector).map_err(|e| {
        CliError::dependency(format!("snapshot {} is unusable: {}", actual.display(), e.0))
    })?;
    let report = match &ring {
        Some(ring) => diff_desired(
            &DesiredState::for_ring(&set, ring),
            &snapshot,
            Some(set.hash()),
        ),
        None => diff(&set, &snapshot),
    };
    emit(
        output_mode,
        json!({
            "command": "drift-check",
            "clean": report.is_clean(),
            "added": report.count(DriftStatus::Added),
            "removed": report.count(DriftStatus::Removed),
            "changed": report.count(DriftStatus::Changed),
            "report": to_value(&report)?,
        }),
    )?;
    if report.is_clean() {
        return Ok(());
    }
    Err(CliError::validation(
        "drift_present",
        &format!(
            "{} drift entries between {} and {}",
            report.entries.len(),
            desired.display(),
            report.selector
        ),
    )
    .with_detail("entries", &report.entries.len().to_string()))
}

pub(crate) fn promote(
    config: &FleetConfig,
    args: PromoteArgs,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let ring = parse_ring(&args.ring)?;
    let policy_dir = args.policies.unwrap_or_else(|| config.policy_dir.clone());
    let set = load_policy_set(config, &policy_dir)?;
    let _lock = StateLockGuard::acquire(&config.state_dir)?;
    let controller = build_controller(config, args.actual.as_deref())?;

    let mut request =
        PromotionRequest::new(set, ring, &config.actor).with_apply_timeout(config.apply_timeout);
    if let Some(id) = &args.change_id {
        request = request.with_change_ticket(id);
    }
    if let Some(reason) = &args.override_reason {
        request = request.with_emergency_override(reason);
    }
    let attempt = controller.promote(request)?;
    if attempt.state != PromotionState::Applied {
        return Err(CliError::rejected(&attempt));
    }
    emit(output_mode, attempt_payload("promote", &attempt)?)
}

pub(crate) fn rollback(
    config: &FleetConfig,
    ring: &str,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let ring = parse_ring(ring)?;
    let _lock = StateLockGuard::acquire(&config.state_dir)?;
    let controller = build_controller(config, None)?;
    let attempt = RollbackManager::new(&controller)
        .with_apply_timeout(config.apply_timeout)
        .rollback(&ring, &config.actor)?;
    emit(output_mode, attempt_payload("rollback", &attempt)?)
}

pub(crate) fn status(config: &FleetConfig, output_mode: OutputMode) -> Result<(), CliError> {
    let state = FleetState::open(&config.state_dir)?;
    let lkg = state.lkg.snapshot()?;
    let rings: Vec<Value> = config
        .rings
        .iter()
        .map(|ring| {
            let current = lkg.current(&ring.name);
            json!({
                "ring": ring.name.as_str(),
                "rank": ring.rank,
                "current": current.map(|e| e.policy_set_hash.to_string()),
                "applied_at_epoch_seconds": current.map(|e| e.applied_at_epoch_seconds),
                "previous": lkg.previous(&ring.name).map(|e| e.policy_set_hash.to_string()),
                "depth": lkg.history(&ring.name).len(),
            })
        })
        .collect();
    emit(
        output_mode,
        json!({
            "command": "status",
            "state_dir": config.state_dir,
            "audit_records": state.audit.len(),
            "rings": rings,
        }),
    )
}

pub(crate) fn run_audit_command(
    config: &FleetConfig,
    command: AuditCommand,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    match command {
        AuditCommand::Verify { from } => audit_verify(config, from, output_mode),
        AuditCommand::Show { limit } => audit_show(config, limit, output_mode),
        AuditCommand::Correct { index, note } => audit_correct(config, index, &note, output_mode),
    }
}

fn open_audit_log(config: &FleetConfig) -> Result<AuditLog, CliError> {
    Ok(AuditLog::open(
        &StatePaths::new(&config.state_dir).audit_log(),
    )?)
}

fn audit_verify(config: &FleetConfig, from: u64, output_mode: OutputMode) -> Result<(), CliError> {
    let report = open_audit_log(config)?.verify_report(from)?;
    emit(
        output_mode,
        json!({
            "command": "audit verify",
            "intact": report.is_intact(),
            "report": to_value(&report)?,
        }),
    )?;
    match report.first_broken {
        None => Ok(()),
        Some(index) => Err(CliError::validation(
            "audit_chain_broken",
            &format!(
                "audit chain broken at record {index}: {}",
                report.reason.as_deref().unwrap_or("integrity mismatch")
            ),
        )
        .with_detail("first_broken", &index.to_string())),
    }
}

fn audit_show(config: &FleetConfig, limit: usize, output_mode: OutputMode) -> Result<(), CliError> {
    let records = open_audit_log(config)?.tail(limit)?;
    emit(
        output_mode,
        json!({
            "command": "audit show",
            "records": to_value(&records)?,
        }),
    )
}

fn audit_correct(
    config: &FleetConfig,
    index: u64,
    note: &str,
    output_mode: OutputMode,
) -> Result<(), CliError> {
    let _lock = StateLockGuard::acquire(&config.state_dir)?;
    let log = open_audit_log(config)?;
    let integrity =
        log.append_correction(index, note, &config.actor, SystemClock.now_epoch_seconds())?;
    info!(references = index, actor = %config.actor, "audit correction appended");
    emit(
        output_mode,
        json!({
            "command": "audit correct",
            "references": index,
            "integrity": integrity.to_string(),
        }),
    )
}

pub(crate) fn print_version(verbose: bool, output_mode: OutputMode) -> Result<(), String> {
    let payload = if verbose {
        json!({
            "name": "bijux-fleet",
            "version": env!("CARGO_PKG_VERSION"),
            "build_hash": option_env!("BIJUX_BUILD_HASH").unwrap_or("dev"),
            "crates": [
                bijux_fleet_core::CRATE_NAME,
                bijux_fleet_model::CRATE_NAME,
                bijux_fleet_policies::CRATE_NAME,
                bijux_fleet_drift::CRATE_NAME,
                bijux_fleet_store::CRATE_NAME,
                bijux_fleet_promotion::CRATE_NAME,
                crate::CRATE_NAME,
            ],
        })
    } else {
        json!({"name": "bijux-fleet", "version": env!("CARGO_PKG_VERSION")})
    };
    emit_ok(output_mode, payload)
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fs;

use bijux_fleet_core::sha256;
use bijux_fleet_model::{
    AuditAction, AuditDraft, AuditResult, Platform, PolicyDocument, PolicyId, PolicyMetadata,
    PolicySet, RingName, RiskTier,
};
use bijux_fleet_store::{FleetState, StateLockGuard, StoreErrorCode};
use serde_json::{json, Value};
use tempfile::tempdir;

fn seed_log(state: &FleetState, count: u64) {
    let qa = RingName::new("qa").expect("ring");
    for n in 0..count {
        state
            .audit
            .append(
                AuditDraft::new(AuditAction::Apply, AuditResult::Ok, "ops", 100 + n)
                    .policy_set(sha256(&n.to_le_bytes()))
                    .ring(&qa)
                    .detail(format!("apply {n}")),
            )
            .expect("append");
    }
}

fn rewrite_line(path: &std::path::Path, index: usize, edit: impl FnOnce(&mut Value)) {
    let raw = fs::read_to_string(path).expect("read log");
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    let mut record: Value = serde_json::from_str(&lines[index]).expect("parse record");
    edit(&mut record);
    lines[index] = serde_json::to_string(&record).expect("encode record");
    fs::write(path, lines.join("\n") + "\n").expect("write log");
}

#[test]
fn tampering_any_field_breaks_verification_from_that_index() {
    for field in ["actor", "detail", "timestamp", "result", "ring"] {
        let dir = tempdir().expect("tempdir");
        let state = FleetState::open(dir.path()).expect("open");
        seed_log(&state, 5);
        assert!(state.audit.verify(0).expect("verify clean"));

        rewrite_line(&state.paths.audit_log(), 2, |r| {
            r[field] = match field {
                "timestamp" => json!(1),
                "result" => json!("failed"),
                "ring" => json!("global"),
                _ => json!("mallory"),
            };
        });

        for from in 0..=2 {
            assert!(!state.audit.verify(from).expect("verify"), "{field} from {from}");
        }
        let report = state.audit.verify_report(0).expect("report");
        assert_eq!(report.first_broken, Some(2));
        assert_eq!(report.checked, 2);
        assert!(state.audit.verify(3).expect("verify tail"));
    }
}

#[test]
fn tampered_integrity_breaks_the_next_link() {
    let dir = tempdir().expect("tempdir");
    let state = FleetState::open(dir.path()).expect("open");
    seed_log(&state, 3);
    rewrite_line(&state.paths.audit_log(), 1, |r| {
        r["integrity"] = json!("0".repeat(64));
    });
    let report = state.audit.verify_report(0).expect("report");
    assert_eq!(report.first_broken, Some(1));
    assert!(!state.audit.verify(2).expect("verify from 2"));
}

#[test]
fn deleting_a_record_is_detected() {
    let dir = tempdir().expect("tempdir");
    let state = FleetState::open(dir.path()).expect("open");
    seed_log(&state, 4);
    let path = state.paths.audit_log();
    let raw = fs::read_to_string(&path).expect("read");
    let kept: Vec<&str> = raw.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
    fs::write(&path, kept.join("\n") + "\n").expect("write");
    assert!(!state.audit.verify(0).expect("verify"));
}

fn policy_set(timeout: u64) -> PolicySet {
    let mut body = BTreeMap::new();
    body.insert("timeout".to_string(), json!(timeout));
    PolicySet::new(vec![PolicyDocument::new(
        PolicyId::new("fw-baseline").expect("id"),
        Platform::Linux,
        "1.0.0",
        PolicyMetadata::new("secops", RiskTier::Low),
        body,
    )])
    .expect("set")
}

#[test]
fn archive_is_content_addressed_and_write_once() {
    let dir = tempdir().expect("tempdir");
    let state = FleetState::open(dir.path()).expect("open");
    let set = policy_set(300);
    state.archive.put(&set).expect("put");
    let path = state.paths.policy_set(set.hash());
    let before = fs::metadata(&path).expect("meta").modified().expect("mtime");
    state.archive.put(&set).expect("put again");
    let after = fs::metadata(&path).expect("meta").modified().expect("mtime");
    assert_eq!(before, after);
    assert_eq!(state.archive.get(set.hash()).expect("get"), set);

    let missing = state.archive.get(policy_set(600).hash()).expect_err("missing");
    assert_eq!(missing.code, StoreErrorCode::NotFound);

    let text = fs::read_to_string(&path).expect("read").replace("300", "301");
    fs::write(&path, text).expect("tamper");
    assert!(state.archive.get(set.hash()).is_err());
}

#[test]
fn state_lock_is_exclusive_and_released_on_drop() {
    let dir = tempdir().expect("tempdir");
    let guard = StateLockGuard::acquire(dir.path()).expect("first lock");
    let err = StateLockGuard::acquire(dir.path()).expect_err("second lock");
    assert_eq!(err.code, StoreErrorCode::Conflict);
    drop(guard);
    StateLockGuard::acquire(dir.path()).expect("lock after release");
}

#[test]
fn torn_last_record_is_reported_and_blocks_appends() {
    let dir = tempdir().expect("tempdir");
    {
        let state = FleetState::open(dir.path()).expect("open");
        seed_log(&state, 1);
        let mut log = fs::OpenOptions::new()
            .append(true)
            .open(state.paths.audit_log())
            .expect("open log");
        std::io::Write::write_all(&mut log, br#"{"index":1,"timest"#).expect("torn write");
    }

    let state = FleetState::open(dir.path()).expect("reopen with torn tail");
    assert_eq!(state.audit.len(), 2);
    assert!(state.lkg.snapshot().is_ok());
    let report = state.audit.verify_report(0).expect("report");
    assert_eq!(report.checked, 1);
    assert_eq!(report.first_broken, Some(1));
    assert!(report.reason.as_deref().is_some_and(|r| r.contains("unreadable")));

    let err = state.audit.ensure_appendable().expect_err("damaged log");
    assert_eq!(err.code, StoreErrorCode::ChainBroken);
    let err = state
        .audit
        .append(AuditDraft::new(AuditAction::Validate, AuditResult::Ok, "ops", 200))
        .expect_err("append refused");
    assert_eq!(err.code, StoreErrorCode::ChainBroken);
    assert_eq!(err.code.as_str(), "audit_chain_broken");
    let err = state
        .audit
        .append_correction(0, "late note", "ops", 201)
        .expect_err("correction refused");
    assert_eq!(err.code, StoreErrorCode::ChainBroken);
    assert_eq!(fs::read_to_string(state.paths.audit_log()).expect("log").lines().count(), 2);
}

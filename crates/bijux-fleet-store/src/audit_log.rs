// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bijux_fleet_core::canonical::stable_json_bytes;
use bijux_fleet_core::Hash256;
use bijux_fleet_model::{AuditAction, AuditDraft, AuditRecord, AuditResult, GENESIS_INTEGRITY};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreErrorCode};

#[derive(Debug, Clone)]
struct ChainTail {
    next_index: u64,
    last_integrity: Hash256,
    /// Set when the last line did not parse, e.g. a write torn by a crash.
    damage: Option<String>,
}

/// Outcome of re-walking the chain from some index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub from: u64,
    pub checked: u64,
    pub first_broken: Option<u64>,
    pub reason: Option<String>,
}

impl ChainVerification {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Append-only, hash-chained JSON-lines log. Records are never rewritten;
/// corrections are appended as new records that reference the old index.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    tail: Mutex<ChainTail>,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut tail = ChainTail {
            next_index: 0,
            last_integrity: GENESIS_INTEGRITY,
            damage: None,
        };
        if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| StoreError::io("read audit log", &e))?;
            let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
            if let Some(last) = lines.last() {
                let index = lines.len() as u64 - 1;
                tail.next_index = lines.len() as u64;
                match serde_json::from_str::<AuditRecord>(last) {
                    Ok(record) => tail.last_integrity = record.integrity,
                    Err(e) => {
                        warn!(index, error = %e, "audit log tail is unreadable; appends refused");
                        tail.damage = Some(format!("record {index} is unreadable: {e}"));
                    }
                }
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            tail: Mutex::new(tail),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.tail.lock().map(|t| t.next_index).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails with `ChainBroken` when the log cannot be extended.
    pub fn ensure_appendable(&self) -> Result<(), StoreError> {
        let tail = self
            .tail
            .lock()
            .map_err(|_| StoreError::new(StoreErrorCode::Internal, "audit log mutex poisoned"))?;
        refuse_damaged(&tail)
    }

    /// Seals `draft` onto the chain and returns its integrity value.
    pub fn append(&self, draft: AuditDraft) -> Result<Hash256, StoreError> {
        Ok(self.append_record(draft)?.integrity)
    }

    pub fn append_record(&self, draft: AuditDraft) -> Result<AuditRecord, StoreError> {
        let mut tail = self
            .tail
            .lock()
            .map_err(|_| StoreError::new(StoreErrorCode::Internal, "audit log mutex poisoned"))?;
        refuse_damaged(&tail)?;
        let record = AuditRecord::seal(draft, tail.next_index, tail.last_integrity)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?;
        let mut line = stable_json_bytes(&record)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?;
        line.push(b'\n');

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| StoreError::io("create state dir", &e))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("open audit log", &e))?;
        f.write_all(&line).map_err(|e| StoreError::io("append audit log", &e))?;
        f.sync_data().map_err(|e| StoreError::io("fsync audit log", &e))?;

        *tail = ChainTail {
            next_index: record.index + 1,
            last_integrity: record.integrity,
            damage: None,
        };
        debug!(
            index = record.index,
            action = record.action.as_str(),
            result = record.result.as_str(),
            "audit record appended"
        );
        Ok(record)
    }

    /// Appends a `correction` record pointing at an existing record.
    pub fn append_correction(
        &self,
        index: u64,
        note: &str,
        actor: &str,
        timestamp: u64,
    ) -> Result<Hash256, StoreError> {
        if index >= self.len() {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("audit record {index} does not exist"),
            ));
        }
        self.append(
            AuditDraft::new(AuditAction::Correction, AuditResult::Ok, actor, timestamp)
                .references(index)
                .detail(note),
        )
    }

    pub fn read_all(&self) -> Result<Vec<AuditRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("read audit log", &e)),
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    StoreError::new(
                        StoreErrorCode::Validation,
                        format!("audit record {i} is unreadable: {e}"),
                    )
                })
            })
            .collect()
    }

    /// Most recent `limit` records, oldest first.
    pub fn tail(&self, limit: usize) -> Result<Vec<AuditRecord>, StoreError> {
        let mut all = self.read_all()?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }

    /// True when every record from `from` onward chains and hashes correctly.
    pub fn verify(&self, from: u64) -> Result<bool, StoreError> {
        Ok(self.verify_report(from)?.is_intact())
    }

    /// Re-walks the chain. Records before `from` are trusted as anchors;
    /// each later record must carry its position as index, link to the
    /// stored integrity of its predecessor, and hash to its own integrity.
    pub fn verify_report(&self, from: u64) -> Result<ChainVerification, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::io("read audit log", &e)),
        };
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut report = ChainVerification {
            from,
            checked: 0,
            first_broken: None,
            reason: None,
        };
        let start = usize::try_from(from).unwrap_or(usize::MAX);
        if start > lines.len() {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("verify start {from} is past the end of the log ({} records)", lines.len()),
            ));
        }

        let mut prev = if start == 0 {
            GENESIS_INTEGRITY
        } else {
            match serde_json::from_str::<AuditRecord>(lines[start - 1]) {
                Ok(anchor) => anchor.integrity,
                Err(e) => {
                    return Ok(broken(report, from - 1, format!("anchor record unreadable: {e}")))
                }
            }
        };
        for (pos, line) in lines.iter().enumerate().skip(start) {
            let index = pos as u64;
            let record: AuditRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => return Ok(broken(report, index, format!("record unreadable: {e}"))),
            };
            if record.index != index {
                return Ok(broken(report, index, format!("stored index {} out of sequence", record.index)));
            }
            if record.prev_integrity != prev {
                return Ok(broken(report, index, "previous integrity link mismatch".to_string()));
            }
            if !record.verify_integrity() {
                return Ok(broken(report, index, "integrity value does not match contents".to_string()));
            }
            prev = record.integrity;
            report.checked += 1;
        }
        Ok(report)
    }
}

fn refuse_damaged(tail: &ChainTail) -> Result<(), StoreError> {
    match &tail.damage {
        Some(damage) => Err(StoreError::new(
            StoreErrorCode::ChainBroken,
            format!("audit log is damaged ({damage}); run `audit verify` and repair it before appending"),
        )),
        None => Ok(()),
    }
}

fn broken(mut report: ChainVerification, index: u64, reason: String) -> ChainVerification {
    warn!(index, reason = %reason, "audit chain broken");
    report.first_broken = Some(index);
    report.reason = Some(reason);
    report
}

// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Durable fleet state: hash-chained audit log, last-known-good table,
//! attempt table, policy-set archive and the single-writer state lock.

use std::fs;
use std::path::Path;

mod archive;
mod atomic;
mod audit_log;
mod error;
mod lock;
mod paths;
mod tables;

pub use archive::PolicySetArchive;
pub use audit_log::{AuditLog, ChainVerification};
pub use atomic::write_atomic;
pub use error::{StoreError, StoreErrorCode};
pub use lock::StateLockGuard;
pub use paths::{
    StatePaths, ATTEMPTS_DIR, ATTEMPT_SEQUENCE_FILE, AUDIT_LOG_FILE, LKG_TABLE_FILE, POLICY_SETS_DIR,
    STATE_LOCK_FILE,
};
pub use tables::{AttemptTable, LkgTable};

pub const CRATE_NAME: &str = "bijux-fleet-store";

/// Every persisted table under one state directory.
#[derive(Debug)]
pub struct FleetState {
    pub paths: StatePaths,
    pub audit: AuditLog,
    pub lkg: LkgTable,
    pub attempts: AttemptTable,
    pub archive: PolicySetArchive,
}

impl FleetState {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|e| StoreError::io("create state dir", &e))?;
        let paths = StatePaths::new(root);
        Ok(Self {
            audit: AuditLog::open(&paths.audit_log())?,
            lkg: LkgTable::open(&paths.lkg_table())?,
            attempts: AttemptTable::open(&paths)?,
            archive: PolicySetArchive::new(paths.clone()),
            paths,
        })
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::fs;

use bijux_fleet_core::Hash256;
use bijux_fleet_model::PolicySet;
use tracing::info;

use crate::atomic::write_json_atomic;
use crate::error::{StoreError, StoreErrorCode};
use crate::paths::StatePaths;

/// Content-addressed archive of applied policy sets, one immutable file
/// per hash. Rollback re-applies sets from here.
#[derive(Debug, Clone)]
pub struct PolicySetArchive {
    paths: StatePaths,
}

impl PolicySetArchive {
    #[must_use]
    pub fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    /// Stores `set` unless its hash is already archived. An existing file
    /// is never rewritten; it must decode to the same hash.
    pub fn put(&self, set: &PolicySet) -> Result<(), StoreError> {
        let path = self.paths.policy_set(set.hash());
        if path.exists() {
            let existing = self.get(set.hash())?;
            if existing.hash() != set.hash() {
                return Err(StoreError::new(
                    StoreErrorCode::Conflict,
                    format!("archived policy set {} is corrupt", set.hash()),
                ));
            }
            return Ok(());
        }
        write_json_atomic(&path, set)?;
        info!(policy_set = %set.hash(), documents = set.len(), "policy set archived");
        Ok(())
    }

    pub fn get(&self, hash: Hash256) -> Result<PolicySet, StoreError> {
        let path = self.paths.policy_set(hash);
        let raw = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::new(StoreErrorCode::NotFound, format!("policy set {hash} is not archived"))
            } else {
                StoreError::io("read archived policy set", &e)
            }
        })?;
        let set: PolicySet = serde_json::from_slice(&raw).map_err(|e| {
            StoreError::new(
                StoreErrorCode::Validation,
                format!("archived policy set {hash} failed verification: {e}"),
            )
        })?;
        if set.hash() != hash {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                format!("archived policy set {hash} hashes to {}", set.hash()),
            ));
        }
        Ok(set)
    }

    #[must_use]
    pub fn contains(&self, hash: Hash256) -> bool {
        self.paths.policy_set(hash).exists()
    }
}

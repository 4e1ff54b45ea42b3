// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use bijux_fleet_core::Hash256;
use bijux_fleet_model::AttemptId;

pub const AUDIT_LOG_FILE: &str = "audit.jsonl";
pub const LKG_TABLE_FILE: &str = "last_known_good.json";
pub const ATTEMPTS_DIR: &str = "attempts";
pub const ATTEMPT_SEQUENCE_FILE: &str = "sequence.json";
pub(crate) const ATTEMPT_FILE_PREFIX: &str = "att-";
pub const POLICY_SETS_DIR: &str = "policy-sets";
pub const STATE_LOCK_FILE: &str = ".state.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    #[must_use]
    pub fn audit_log(&self) -> PathBuf {
        self.root.join(AUDIT_LOG_FILE)
    }

    #[must_use]
    pub fn lkg_table(&self) -> PathBuf {
        self.root.join(LKG_TABLE_FILE)
    }

    #[must_use]
    pub fn attempts_dir(&self) -> PathBuf {
        self.root.join(ATTEMPTS_DIR)
    }

    #[must_use]
    pub fn attempt_sequence(&self) -> PathBuf {
        self.attempts_dir().join(ATTEMPT_SEQUENCE_FILE)
    }

    #[must_use]
    pub fn attempt(&self, id: &AttemptId) -> PathBuf {
        self.attempts_dir().join(format!("{id}.json"))
    }

    #[must_use]
    pub fn policy_sets_dir(&self) -> PathBuf {
        self.root.join(POLICY_SETS_DIR)
    }

    #[must_use]
    pub fn policy_set(&self, hash: Hash256) -> PathBuf {
        self.policy_sets_dir().join(format!("{hash}.json"))
    }

    #[must_use]
    pub fn state_lock(&self) -> PathBuf {
        self.root.join(STATE_LOCK_FILE)
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bijux_fleet_model::{AttemptId, LastKnownGood, LkgEntry, PromotionAttempt, RingName};
use serde::{Deserialize, Serialize};

use crate::atomic::{read_json, read_json_or_default, write_json_atomic};
use crate::error::{StoreError, StoreErrorCode};
use crate::paths::{StatePaths, ATTEMPT_FILE_PREFIX};

fn poisoned(table: &str) -> StoreError {
    StoreError::new(StoreErrorCode::Internal, format!("{table} mutex poisoned"))
}

/// File-backed last-known-good table. Every mutation is persisted before
/// it becomes visible in memory.
#[derive(Debug)]
pub struct LkgTable {
    path: PathBuf,
    inner: Mutex<LastKnownGood>,
}

impl LkgTable {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(read_json_or_default(path)?),
        })
    }

    pub fn snapshot(&self) -> Result<LastKnownGood, StoreError> {
        self.inner.lock().map(|t| t.clone()).map_err(|_| poisoned("lkg table"))
    }

    pub fn current(&self, ring: &RingName) -> Result<Option<LkgEntry>, StoreError> {
        Ok(self.snapshot()?.current(ring).cloned())
    }

    pub fn previous(&self, ring: &RingName) -> Result<Option<LkgEntry>, StoreError> {
        Ok(self.snapshot()?.previous(ring).cloned())
    }

    pub fn record_applied(&self, ring: &RingName, entry: LkgEntry) -> Result<(), StoreError> {
        self.mutate(|t| t.record_applied(ring, entry))
    }

    pub fn pop(&self, ring: &RingName) -> Result<Option<LkgEntry>, StoreError> {
        self.mutate(|t| t.pop(ring))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut LastKnownGood) -> R) -> Result<R, StoreError> {
        let mut guard = self.inner.lock().map_err(|_| poisoned("lkg table"))?;
        let mut next = guard.clone();
        let out = f(&mut next);
        write_json_atomic(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttemptSequence {
    next_sequence: u64,
}

#[derive(Debug, Default)]
struct AttemptCache {
    sequence: AttemptSequence,
    attempts: BTreeMap<AttemptId, PromotionAttempt>,
}

/// Directory-backed table of every promotion attempt: one JSON file per
/// attempt plus a sequence file. A transition rewrites only its own attempt.
#[derive(Debug)]
pub struct AttemptTable {
    paths: StatePaths,
    inner: Mutex<AttemptCache>,
}

impl AttemptTable {
    pub fn open(paths: &StatePaths) -> Result<Self, StoreError> {
        let mut sequence: AttemptSequence = read_json_or_default(&paths.attempt_sequence())?;
        if sequence.next_sequence == 0 {
            sequence.next_sequence = 1;
        }
        let mut attempts = BTreeMap::new();
        let dir = paths.attempts_dir();
        if dir.exists() {
            let entries = fs::read_dir(&dir).map_err(|e| StoreError::io("read attempts dir", &e))?;
            for entry in entries {
                let path = entry.map_err(|e| StoreError::io("read attempts dir", &e))?.path();
                let is_attempt = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(ATTEMPT_FILE_PREFIX) && n.ends_with(".json"));
                if !is_attempt {
                    continue;
                }
                let attempt: PromotionAttempt = read_json(&path)?;
                attempts.insert(attempt.id.clone(), attempt);
            }
        }
        Ok(Self {
            paths: paths.clone(),
            inner: Mutex::new(AttemptCache { sequence, attempts }),
        })
    }

    /// Reserves the next sequential id. The reservation is persisted so ids
    /// are never reused across restarts.
    pub fn allocate_id(&self) -> Result<AttemptId, StoreError> {
        let mut guard = self.inner.lock().map_err(|_| poisoned("attempt table"))?;
        let id = AttemptId::from_sequence(guard.sequence.next_sequence);
        let next = AttemptSequence {
            next_sequence: guard.sequence.next_sequence + 1,
        };
        write_json_atomic(&self.paths.attempt_sequence(), &next)?;
        guard.sequence = next;
        Ok(id)
    }

    pub fn put(&self, attempt: &PromotionAttempt) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(|_| poisoned("attempt table"))?;
        write_json_atomic(&self.paths.attempt(&attempt.id), attempt)?;
        guard.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    pub fn get(&self, id: &AttemptId) -> Result<Option<PromotionAttempt>, StoreError> {
        let guard = self.inner.lock().map_err(|_| poisoned("attempt table"))?;
        Ok(guard.attempts.get(id).cloned())
    }

    /// All attempts in id order.
    pub fn list(&self) -> Result<Vec<PromotionAttempt>, StoreError> {
        let guard = self.inner.lock().map_err(|_| poisoned("attempt table"))?;
        Ok(guard.attempts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{AttemptTable, LkgTable};
    use crate::error::StoreErrorCode;
    use crate::paths::StatePaths;
    use bijux_fleet_core::sha256;
    use bijux_fleet_model::{AttemptId, LkgEntry, PromotionAttempt, PromotionState, RingName};

    #[test]
    fn lkg_table_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("last_known_good.json");
        let qa = RingName::new("qa").expect("ring");
        {
            let table = LkgTable::open(&path).expect("open");
            table
                .record_applied(
                    &qa,
                    LkgEntry {
                        policy_set_hash: sha256(b"p1"),
                        attempt_id: AttemptId::from_sequence(1),
                        applied_at_epoch_seconds: 5,
                    },
                )
                .expect("record");
        }
        let table = LkgTable::open(&path).expect("reopen");
        let current = table.current(&qa).expect("read").expect("entry");
        assert_eq!(current.policy_set_hash, sha256(b"p1"));
    }

    #[test]
    fn attempt_ids_are_never_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());
        let first = AttemptTable::open(&paths).expect("open").allocate_id().expect("id");
        let table = AttemptTable::open(&paths).expect("reopen");
        let second = table.allocate_id().expect("id");
        assert_eq!(first.as_str(), "att-000001");
        assert_eq!(second.as_str(), "att-000002");

        let attempt = attempt(&second);
        table.put(&attempt).expect("put");
        assert_eq!(table.get(&second).expect("get"), Some(attempt));
        assert_eq!(table.list().expect("list").len(), 1);
    }

    fn attempt(id: &AttemptId) -> PromotionAttempt {
        PromotionAttempt::new(
            id.clone(),
            sha256(b"p1"),
            RingName::new("qa").expect("ring"),
            None,
            "ops",
            1,
        )
    }

    #[test]
    fn transitions_rewrite_only_their_own_attempt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());
        let table = AttemptTable::open(&paths).expect("open");
        let first = table.allocate_id().expect("id");
        let second = table.allocate_id().expect("id");
        table.put(&attempt(&first)).expect("put first");
        let first_bytes = fs::read(paths.attempt(&first)).expect("first file");

        let mut moved = attempt(&second);
        table.put(&moved).expect("put second");
        moved.state = PromotionState::Validating;
        table.put(&moved).expect("transition second");

        assert_eq!(fs::read(paths.attempt(&first)).expect("first file"), first_bytes);
        let reopened = AttemptTable::open(&paths).expect("reopen");
        let listed = reopened.list().expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].state, PromotionState::Validating);
        assert_eq!(reopened.allocate_id().expect("id").as_str(), "att-000003");
    }

    #[test]
    fn unreadable_attempt_file_fails_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());
        let table = AttemptTable::open(&paths).expect("open");
        let id = table.allocate_id().expect("id");
        table.put(&attempt(&id)).expect("put");
        fs::write(paths.attempt(&id), b"{\"id\":").expect("truncate");
        let err = AttemptTable::open(&paths).expect_err("corrupt attempt");
        assert_eq!(err.code, StoreErrorCode::Validation);
    }
}

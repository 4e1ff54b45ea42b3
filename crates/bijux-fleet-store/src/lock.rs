// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreErrorCode};
use crate::paths::StatePaths;

/// Single-writer lock over a state directory, released on drop.
#[derive(Debug)]
pub struct StateLockGuard {
    lock_path: PathBuf,
}

impl StateLockGuard {
    pub fn acquire(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|e| StoreError::io("create state dir", &e))?;
        let lock_path = StatePaths::new(root).state_lock();
        match OpenOptions::new().create_new(true).write(true).open(&lock_path) {
            Ok(mut f) => {
                let _ = writeln!(f, "{}", std::process::id());
                Ok(Self { lock_path })
            }
            Err(e) => Err(StoreError::new(
                StoreErrorCode::Conflict,
                format!(
                    "failed to acquire state lock {}: {e} (remove it if no other bijux-fleet process is running)",
                    lock_path.display()
                ),
            )),
        }
    }
}

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreErrorCode};

pub(crate) fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut f = fs::File::create(path).map_err(|e| StoreError::io("create", &e))?;
    f.write_all(bytes).map_err(|e| StoreError::io("write", &e))?;
    f.sync_all().map_err(|e| StoreError::io("fsync", &e))?;
    Ok(())
}

pub(crate) fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| StoreError::io("open dir", &e))?;
    f.sync_all().map_err(|e| StoreError::io("fsync dir", &e))?;
    Ok(())
}

/// tmp + fsync + rename + dir fsync.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::new(StoreErrorCode::Internal, "path has no parent directory"))?;
    fs::create_dir_all(dir).map_err(|e| StoreError::io("create state dir", &e))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::new(StoreErrorCode::Internal, "path has no file name"))?;
    let tmp = dir.join(format!(".{name}.tmp"));
    write_and_sync(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io("rename", &e))?;
    sync_dir(dir)
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Missing file reads as `T::default()`.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read(path).map_err(|e| StoreError::io("read", &e))?;
    serde_json::from_slice(&raw).map_err(|e| {
        StoreError::new(
            StoreErrorCode::Validation,
            format!("{}: {e}", path.display()),
        )
    })
}

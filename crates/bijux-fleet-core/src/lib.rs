// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Shared primitives for the fleet policy workspace: exit codes, machine
//! errors, canonical hashing, config path resolution and the clock port.

pub mod canonical;
mod config;
mod errors;
mod time;

pub use canonical::{sha256, sha256_hex, stable_hash_bytes, stable_hash_hex, Hash256};
pub use config::{
    resolve_fleet_actor, resolve_fleet_config_path, resolve_fleet_state_dir, ConfigPathScope,
};
pub use errors::{Error, ExitCode, MachineError, Result};
pub use time::{ClockPort, FixedClock, SystemClock};

pub const CRATE_NAME: &str = "bijux-fleet-core";

pub const ENV_BIJUX_LOG_LEVEL: &str = "BIJUX_LOG_LEVEL";
pub const ENV_FLEET_CONFIG: &str = "BIJUX_FLEET_CONFIG";
pub const ENV_FLEET_STATE_DIR: &str = "BIJUX_FLEET_STATE_DIR";
pub const ENV_FLEET_ACTOR: &str = "BIJUX_FLEET_ACTOR";
pub const ENV_FLEET_LOG_JSON: &str = "BIJUX_FLEET_LOG_JSON";

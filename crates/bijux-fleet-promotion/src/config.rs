// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bijux_fleet_core::{
    resolve_fleet_actor, resolve_fleet_config_path, resolve_fleet_state_dir, ConfigPathScope,
    ENV_FLEET_CONFIG,
};
use bijux_fleet_model::{Ring, RingCatalog, RingName, DEFAULT_TELEMETRY_FRESHNESS_SECS};
use bijux_fleet_policies::{default_required_metadata, PolicyStoreConfig, DEFAULT_NAMING_PATTERN};
use serde::Deserialize;

use crate::controller::DEFAULT_APPLY_TIMEOUT;
use crate::error::{PromotionError, PromotionErrorCode};

pub const DEFAULT_POLICY_DIR: &str = "policies";
pub const FLEET_DIR_NAME: &str = "fleet";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFleetConfig {
    state_dir: Option<PathBuf>,
    policy_dir: Option<PathBuf>,
    actor: Option<String>,
    apply_timeout_ms: Option<u64>,
    naming_pattern: Option<String>,
    required_metadata: Option<Vec<String>>,
    #[serde(default)]
    rings: Vec<RawRing>,
    change_tickets: Option<PathBuf>,
    telemetry: Option<PathBuf>,
    fleet_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRing {
    name: String,
    rank: u32,
    #[serde(default)]
    requires_change_ticket: bool,
    #[serde(default)]
    requires_telemetry: bool,
    #[serde(default)]
    tolerate_drift: bool,
    telemetry_freshness_secs: Option<u64>,
}

/// Resolved `fleet.toml` with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    /// File the values came from; `None` means built-in defaults.
    pub source: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub policy_dir: PathBuf,
    pub actor: String,
    pub apply_timeout: Duration,
    pub naming_pattern: String,
    pub required_metadata: Vec<String>,
    pub rings: RingCatalog,
    pub change_tickets: Option<PathBuf>,
    pub telemetry: Option<PathBuf>,
    pub fleet_dir: PathBuf,
}

impl FleetConfig {
    /// Built-in defaults, as if no config file existed.
    pub fn defaults() -> Result<Self, PromotionError> {
        Self::from_raw(RawFleetConfig::default(), None)
    }

    pub fn from_toml_str(text: &str, source: Option<&Path>) -> Result<Self, PromotionError> {
        let shown = source.map_or_else(|| "<inline>".to_string(), |p| p.display().to_string());
        let raw: RawFleetConfig = toml::from_str(text).map_err(|err| {
            PromotionError::new(
                PromotionErrorCode::Config,
                format!("failed to parse {shown}: {err}"),
            )
        })?;
        Self::from_raw(raw, source)
    }

    pub fn load(path: &Path) -> Result<Self, PromotionError> {
        let text = fs::read_to_string(path).map_err(|err| {
            PromotionError::new(
                PromotionErrorCode::Config,
                format!("failed to read {}: {err}", path.display()),
            )
        })?;
        Self::from_toml_str(&text, Some(path))
    }

    /// `--config`, then `BIJUX_FLEET_CONFIG` (both must exist), then the
    /// first existing of workspace and user config, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, PromotionError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env_config_path() {
            return Self::load(&path);
        }
        for scope in [ConfigPathScope::Workspace, ConfigPathScope::User] {
            let path = resolve_fleet_config_path(scope);
            if path.is_file() {
                return Self::load(&path);
            }
        }
        Self::defaults()
    }

    #[must_use]
    pub fn policy_store_config(&self) -> PolicyStoreConfig {
        PolicyStoreConfig {
            naming_pattern: self.naming_pattern.clone(),
            required_metadata: self.required_metadata.clone(),
            known_rings: self.rings.names(),
        }
    }

    fn from_raw(raw: RawFleetConfig, source: Option<&Path>) -> Result<Self, PromotionError> {
        let rings = if raw.rings.is_empty() {
            RingCatalog::default_catalog()
        } else {
            let rings = raw
                .rings
                .into_iter()
                .map(|row| {
                    let name = RingName::new(row.name).map_err(|e| config_error(&e.0))?;
                    let mut ring = Ring::new(name, row.rank);
                    ring.required_gates.change_ticket = row.requires_change_ticket;
                    ring.required_gates.telemetry = row.requires_telemetry;
                    ring.tolerate_drift = row.tolerate_drift;
                    ring.telemetry_freshness_secs = row
                        .telemetry_freshness_secs
                        .unwrap_or(DEFAULT_TELEMETRY_FRESHNESS_SECS);
                    Ok(ring)
                })
                .collect::<Result<Vec<_>, PromotionError>>()?;
            RingCatalog::new(rings).map_err(|e| config_error(&e.0))?
        };
        let state_dir = raw.state_dir.unwrap_or_else(resolve_fleet_state_dir);
        let fleet_dir = raw
            .fleet_dir
            .unwrap_or_else(|| state_dir.join(FLEET_DIR_NAME));
        Ok(Self {
            source: source.map(Path::to_path_buf),
            policy_dir: raw
                .policy_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_POLICY_DIR)),
            actor: raw
                .actor
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(resolve_fleet_actor),
            apply_timeout: raw
                .apply_timeout_ms
                .map_or(DEFAULT_APPLY_TIMEOUT, Duration::from_millis),
            naming_pattern: raw
                .naming_pattern
                .unwrap_or_else(|| DEFAULT_NAMING_PATTERN.to_string()),
            required_metadata: raw
                .required_metadata
                .unwrap_or_else(default_required_metadata),
            rings,
            change_tickets: raw.change_tickets,
            telemetry: raw.telemetry,
            fleet_dir,
            state_dir,
        })
    }
}

fn config_error(message: &str) -> PromotionError {
    PromotionError::new(PromotionErrorCode::Config, format!("invalid ring catalog: {message}"))
}

fn env_config_path() -> Option<PathBuf> {
    std::env::var(ENV_FLEET_CONFIG)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Candidate config locations in resolution order, labelled for display.
#[must_use]
pub fn config_search_paths(explicit: Option<&Path>) -> Vec<(&'static str, PathBuf)> {
    let mut out = Vec::new();
    if let Some(path) = explicit {
        out.push(("explicit", path.to_path_buf()));
    }
    if let Some(path) = env_config_path() {
        out.push(("env", path));
    }
    out.push((
        "workspace",
        resolve_fleet_config_path(ConfigPathScope::Workspace),
    ));
    out.push(("user", resolve_fleet_config_path(ConfigPathScope::User)));
    out
}

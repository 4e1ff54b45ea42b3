// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigPathScope {
    User,
    Workspace,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[must_use]
pub fn resolve_fleet_config_path(scope: ConfigPathScope) -> PathBuf {
    match scope {
        ConfigPathScope::User => {
            if let Some(xdg_config_home) = non_empty_env("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg_config_home)
                    .join("bijux")
                    .join("fleet.toml");
            }
            if let Some(home) = non_empty_env("HOME") {
                return PathBuf::from(home)
                    .join(".config")
                    .join("bijux")
                    .join("fleet.toml");
            }
            PathBuf::from(".bijux").join("fleet.toml")
        }
        ConfigPathScope::Workspace => PathBuf::from(".bijux").join("fleet.toml"),
    }
}

#[must_use]
pub fn resolve_fleet_state_dir() -> PathBuf {
    if let Some(explicit) = non_empty_env(crate::ENV_FLEET_STATE_DIR) {
        return PathBuf::from(explicit);
    }
    PathBuf::from(".bijux").join("fleet-state")
}

#[must_use]
pub fn resolve_fleet_actor() -> String {
    non_empty_env(crate::ENV_FLEET_ACTOR)
        .or_else(|| non_empty_env("USER"))
        .unwrap_or_else(|| "unknown".to_string())
}

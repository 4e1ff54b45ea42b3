// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use predicates::str::contains;

fn parse_commands_from_help(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut in_commands = false;
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed == "Commands:" {
            in_commands = true;
            continue;
        }
        if in_commands {
            if trimmed.is_empty() {
                break;
            }
            let entry = trimmed.trim_start();
            let name = entry.split_whitespace().next().unwrap_or("");
            if !name.is_empty() && name != "help" {
                commands.push(name.to_string());
            }
        }
    }
    commands.sort();
    commands
}

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bijux-fleet"));
    cmd.env_remove("BIJUX_FLEET_CONFIG")
        .env_remove("BIJUX_LOG_LEVEL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_command_surface_is_stable() {
    let output = bin().arg("--help").output().expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 help");
    let observed = parse_commands_from_help(&text);
    let expected = include_str!("snapshots/help.commands.txt")
        .lines()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(observed, expected);
    assert!(text.contains("BIJUX_FLEET_STATE_DIR"));
}

#[test]
fn version_output_contains_crate_version() {
    let output = bin().arg("version").output().expect("run version");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 version output");
    assert!(text.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_flag_returns_usage_exit_code_with_machine_error() {
    let output = bin()
        .args(["--json", "--unknown-flag"])
        .output()
        .expect("run bad cli");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("usage_error"));
}

#[test]
fn missing_command_is_a_usage_error() {
    bin().assert().code(2).stderr(contains("missing command"));
}

#[test]
fn emergency_override_requires_a_reason() {
    bin()
        .args(["promote", "--ring", "qa", "--emergency-override"])
        .assert()
        .code(2);
}

#[test]
fn completion_script_names_the_binary() {
    bin()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("bijux-fleet"));
}

#[test]
fn print_config_paths_lists_search_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = bin()
        .current_dir(tmp.path())
        .args(["--json", "--print-config-paths"])
        .output()
        .expect("run print-config-paths");
    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("config paths json");
    let scopes: Vec<&str> = payload["config_search"]
        .as_array()
        .expect("search list")
        .iter()
        .filter_map(|entry| entry["scope"].as_str())
        .collect();
    assert_eq!(scopes, vec!["workspace", "user"]);
    assert!(payload.get("state_dir").is_some());
}

#[test]
fn unreadable_config_is_a_usage_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    bin()
        .arg("--config")
        .arg(tmp.path().join("absent.toml"))
        .arg("status")
        .assert()
        .code(2);
}

// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use bijux_fleet_policies::{load, PolicyStoreConfig, ViolationKind, DEFAULT_REQUIRED_METADATA};
use serde_json::Value;

fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, body).expect("write fixture");
    path
}

const FW_BASELINE: &str = r#"{
  "name": "fw-baseline",
  "platform": "windows",
  "version": "1.0.0",
  "metadata": {"owner": "secops", "risk_level": "medium", "approver_groups": ["cab"], "change_ticket_required": false, "rollout_strategy": "ringed"},
  "settings": {"timeout": 300, "enabled": true}
}"#;

const USB_LOCKDOWN_YAML: &str = "name: usb-lockdown
platform: macos
version: 2.0.0
metadata:
  owner: endpoint
  approver_groups: [endpoint-cab]
  change_ticket_required: true
  risk_level: high
  rollout_strategy: ringed
settings:
  block_mass_storage: true
scope:
  supported_rings: [qa, security]
";

#[test]
fn loads_json_and_yaml_from_nested_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "windows/fw-baseline.json", FW_BASELINE);
    write(dir.path(), "macos/usb.yaml", USB_LOCKDOWN_YAML);
    write(dir.path(), "README.md", "not a policy");

    let set = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default()).expect("load");
    assert_eq!(set.len(), 2);
    let ids: Vec<&str> = set.documents().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["fw-baseline", "usb-lockdown"]);
}

#[test]
fn hash_is_stable_across_directory_layouts() {
    let a = tempfile::tempdir().expect("tempdir a");
    write(a.path(), "one/fw.json", FW_BASELINE);
    write(a.path(), "two/usb.yml", USB_LOCKDOWN_YAML);
    let b = tempfile::tempdir().expect("tempdir b");
    write(b.path(), "z-usb.yaml", USB_LOCKDOWN_YAML);
    write(b.path(), "a/b/c/fw.json", FW_BASELINE);

    let cfg = PolicyStoreConfig::default();
    let set_a = load(&[a.path().to_path_buf()], &cfg).expect("load a");
    let set_b = load(&[b.path().to_path_buf()], &cfg).expect("load b");
    assert_eq!(set_a.hash(), set_b.hash());
}

#[test]
fn aggregates_violations_across_all_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "broken.json", "{ not json");
    write(
        dir.path(),
        "bad-name.json",
        &FW_BASELINE.replace("\"fw-baseline\"", "\"FW Baseline\""),
    );
    write(
        dir.path(),
        "no-owner.json",
        &FW_BASELINE
            .replace("\"fw-baseline\"", "\"no-owner\"")
            .replace("\"owner\": \"secops\", ", ""),
    );

    let err = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default()).expect_err("invalid");
    assert_eq!(err.count(ViolationKind::Schema), 1);
    assert_eq!(err.count(ViolationKind::Naming), 1);
    assert_eq!(err.count(ViolationKind::Metadata), 1);
    let rendered = err.to_string();
    assert!(rendered.starts_with("3 policy violation(s)"));
    assert!(rendered.contains("broken.json"));
}

#[test]
fn duplicate_names_are_naming_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.json", FW_BASELINE);
    write(dir.path(), "b.json", FW_BASELINE);

    let err = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default()).expect_err("dup");
    assert_eq!(err.violations.len(), 1);
    assert_eq!(err.violations[0].rule, "policy.name.unique");
    assert_eq!(err.violations[0].policy_id.as_deref(), Some("fw-baseline"));
}

#[test]
fn empty_or_missing_sources_are_schema_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default()).expect_err("empty");
    assert_eq!(err.violations[0].rule, "source.empty");

    let missing = dir.path().join("nope");
    let err = load(&[missing], &PolicyStoreConfig::default()).expect_err("missing");
    assert_eq!(err.violations[0].rule, "source.missing");
}

#[test]
fn single_file_source_and_custom_required_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(dir.path(), "fw.json", FW_BASELINE);
    let mut cfg = PolicyStoreConfig::default();
    cfg.required_metadata.push("data_classification".to_string());

    let err = load(&[file.clone()], &cfg).expect_err("missing metadata");
    assert_eq!(err.primary_code(), "metadata_error");
    assert!(err.violations[0].message.contains("data_classification"));

    let set = load(&[file], &PolicyStoreConfig::default()).expect("default metadata");
    assert_eq!(set.len(), 1);
}

#[test]
fn unknown_top_level_fields_fail_the_typed_shape() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "fw.json",
        &FW_BASELINE.replace("\"version\"", "\"surprise\": 1, \"version\""),
    );
    let err = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default()).expect_err("shape");
    assert_eq!(err.violations[0].rule, "policy.document.shape");
}

#[test]
fn each_default_metadata_field_is_required() {
    for field in DEFAULT_REQUIRED_METADATA {
        let mut doc: Value = serde_json::from_str(FW_BASELINE).expect("fixture json");
        doc["metadata"]
            .as_object_mut()
            .expect("metadata object")
            .remove(*field);
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "fw.json", &doc.to_string());

        let err = load(&[dir.path().to_path_buf()], &PolicyStoreConfig::default())
            .expect_err("missing metadata field");
        assert_eq!(err.primary_code(), "metadata_error", "{field}");
        assert!(
            err.violations
                .iter()
                .any(|v| v.rule == "policy.metadata.required" && v.message.contains(*field)),
            "{field}: {err}"
        );
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::PathBuf;

use regex::Regex;
use serde_json::Value;

use bijux_fleet_model::{PolicyDocument, PolicySet, RingCatalog, RingName};

use crate::rules::{lint_document, LintContext};
use crate::source::{discover_documents, parse_document};
use crate::violation::{PolicyValidationError, PolicyViolation, ViolationKind};

pub const DEFAULT_NAMING_PATTERN: &str = r"^[a-z0-9][a-z0-9-]{0,62}[a-z0-9]$";

/// Metadata keys every document must carry unless the config overrides them.
pub const DEFAULT_REQUIRED_METADATA: &[&str] = &[
    "owner",
    "approver_groups",
    "change_ticket_required",
    "risk_level",
    "rollout_strategy",
];

#[must_use]
pub fn default_required_metadata() -> Vec<String> {
    DEFAULT_REQUIRED_METADATA
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStoreConfig {
    pub naming_pattern: String,
    pub required_metadata: Vec<String>,
    pub known_rings: Vec<RingName>,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            naming_pattern: DEFAULT_NAMING_PATTERN.to_string(),
            required_metadata: default_required_metadata(),
            known_rings: RingCatalog::default_catalog().names(),
        }
    }
}

/// Loads, lints and hashes every document under `sources`. All violations
/// across all documents are collected before failing.
pub fn load(sources: &[PathBuf], config: &PolicyStoreConfig) -> Result<PolicySet, PolicyValidationError> {
    let files = discover_documents(sources).map_err(PolicyValidationError::single)?;
    if files.is_empty() {
        let shown: Vec<String> = sources.iter().map(|p| p.display().to_string()).collect();
        return Err(PolicyValidationError::single(PolicyViolation::new(
            ViolationKind::Schema,
            "source.empty",
            &shown.join(","),
            "no policy documents (.json, .yaml, .yml) found",
        )));
    }

    let mut parsed = Vec::with_capacity(files.len());
    let mut violations = Vec::new();
    for file in &files {
        match parse_document(file) {
            Ok(value) => parsed.push((file.display().to_string(), value)),
            Err(v) => violations.push(v),
        }
    }
    let (set, mut rest) = load_values(&parsed, config);
    violations.append(&mut rest);
    match set {
        Some(set) if violations.is_empty() => Ok(set),
        _ => Err(PolicyValidationError { violations }),
    }
}

/// Lints already-parsed documents given as `(display path, value)` pairs.
pub fn load_documents(
    documents: &[(String, Value)],
    config: &PolicyStoreConfig,
) -> Result<PolicySet, PolicyValidationError> {
    match load_values(documents, config) {
        (Some(set), violations) if violations.is_empty() => Ok(set),
        (_, violations) => Err(PolicyValidationError { violations }),
    }
}

fn load_values(
    documents: &[(String, Value)],
    config: &PolicyStoreConfig,
) -> (Option<PolicySet>, Vec<PolicyViolation>) {
    let naming = match Regex::new(&config.naming_pattern) {
        Ok(re) => re,
        Err(e) => {
            return (
                None,
                vec![PolicyViolation::new(
                    ViolationKind::Naming,
                    "config.naming_pattern",
                    "fleet.toml",
                    format!("naming pattern does not compile: {e}"),
                )],
            )
        }
    };
    let ctx = match LintContext::new(&naming, &config.required_metadata, &config.known_rings) {
        Ok(ctx) => ctx,
        Err(e) => {
            return (
                None,
                vec![PolicyViolation::new(
                    ViolationKind::Schema,
                    "config.semver_pattern",
                    "builtin",
                    e.to_string(),
                )],
            )
        }
    };

    let mut violations = Vec::new();
    let mut typed = Vec::new();
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (path, value) in documents {
        let found = lint_document(path, value, &ctx);
        if let Some(name) = value.get("name").and_then(Value::as_str) {
            if let Some(first) = seen.get(name) {
                violations.push(
                    PolicyViolation::new(
                        ViolationKind::Naming,
                        "policy.name.unique",
                        path,
                        format!("duplicate policy name `{name}` (first defined in {first})"),
                    )
                    .for_policy(Some(name)),
                );
            } else {
                seen.insert(name.to_string(), path.clone());
            }
        }
        if !found.is_empty() {
            violations.extend(found);
            continue;
        }
        match serde_json::from_value::<PolicyDocument>(value.clone()) {
            Ok(doc) => typed.push(doc),
            Err(e) => violations.push(
                PolicyViolation::new(
                    ViolationKind::Schema,
                    "policy.document.shape",
                    path,
                    format!("document does not match the policy shape: {e}"),
                )
                .for_policy(value.get("name").and_then(Value::as_str)),
            ),
        }
    }
    if !violations.is_empty() {
        return (None, violations);
    }
    match PolicySet::new(typed) {
        Ok(set) => (Some(set), violations),
        Err(e) => (
            None,
            vec![PolicyViolation::new(
                ViolationKind::Schema,
                "policy.set.build",
                "policy set",
                e.0,
            )],
        ),
    }
}

// SPDX-License-Identifier: Apache-2.0

use regex::Regex;
use serde_json::Value;

use bijux_fleet_model::{Platform, RingName, RiskTier, RolloutStrategy};

use crate::violation::{PolicyViolation, ViolationKind};

pub const REQUIRED_TOP_LEVEL: &[&str] = &["name", "platform", "version", "metadata", "settings"];
pub const BREAK_GLASS_NAMES: &[&str] = &["break-glass-exception", "break_glass_exception"];
pub const BREAK_GLASS_MAX_DURATION_MINUTES: u64 = 240;

const SEMVER_PATTERN: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:[-+].+)?$";
const PLATFORMS: &[&str] = &["windows", "macos", "linux", "ios", "android", "cross-platform"];
const RISK_LEVELS: &[&str] = &["low", "medium", "high", "critical"];
const ROLLOUT_STRATEGIES: &[&str] = &["ringed", "manual-only"];

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    OneOf(&'static [&'static str]),
    Semver,
    Object,
    Bool,
    NonEmptyString,
    NonEmptyStringList,
}

#[derive(Debug, Clone, Copy)]
struct RuleSpec {
    id: &'static str,
    kind: ViolationKind,
    message: &'static str,
    path: &'static str,
    check: RuleKind,
}

/// Shape rules. Each applies only when its path is present; presence is
/// enforced separately so a missing field is reported once.
const DOCUMENT_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "policy.name.non_empty",
        kind: ViolationKind::Schema,
        message: "name must be a non-empty string",
        path: "name",
        check: RuleKind::NonEmptyString,
    },
    RuleSpec {
        id: "policy.platform.allowed",
        kind: ViolationKind::Schema,
        message: "platform must be one of windows, macos, linux, ios, android, cross-platform",
        path: "platform",
        check: RuleKind::OneOf(PLATFORMS),
    },
    RuleSpec {
        id: "policy.version.semver",
        kind: ViolationKind::Schema,
        message: "version must be semver (e.g. 1.2.3)",
        path: "version",
        check: RuleKind::Semver,
    },
    RuleSpec {
        id: "policy.metadata.object",
        kind: ViolationKind::Schema,
        message: "metadata must be an object",
        path: "metadata",
        check: RuleKind::Object,
    },
    RuleSpec {
        id: "policy.settings.object",
        kind: ViolationKind::Schema,
        message: "settings must be an object",
        path: "settings",
        check: RuleKind::Object,
    },
    RuleSpec {
        id: "policy.scope.object",
        kind: ViolationKind::Schema,
        message: "scope must be an object",
        path: "scope",
        check: RuleKind::Object,
    },
    RuleSpec {
        id: "policy.telemetry_expectations.object",
        kind: ViolationKind::Schema,
        message: "telemetry_expectations must be an object",
        path: "telemetry_expectations",
        check: RuleKind::Object,
    },
    RuleSpec {
        id: "policy.time_constraints.object",
        kind: ViolationKind::Schema,
        message: "time_constraints must be an object",
        path: "time_constraints",
        check: RuleKind::Object,
    },
    RuleSpec {
        id: "policy.metadata.owner.non_empty",
        kind: ViolationKind::Metadata,
        message: "metadata.owner must be a non-empty string",
        path: "metadata.owner",
        check: RuleKind::NonEmptyString,
    },
    RuleSpec {
        id: "policy.metadata.risk_level.allowed",
        kind: ViolationKind::Metadata,
        message: "metadata.risk_level must be one of low, medium, high, critical",
        path: "metadata.risk_level",
        check: RuleKind::OneOf(RISK_LEVELS),
    },
    RuleSpec {
        id: "policy.metadata.rollout_strategy.allowed",
        kind: ViolationKind::Metadata,
        message: "metadata.rollout_strategy must be one of ringed, manual-only",
        path: "metadata.rollout_strategy",
        check: RuleKind::OneOf(ROLLOUT_STRATEGIES),
    },
    RuleSpec {
        id: "policy.metadata.approver_groups.non_empty",
        kind: ViolationKind::Metadata,
        message: "metadata.approver_groups must be a non-empty list of strings",
        path: "metadata.approver_groups",
        check: RuleKind::NonEmptyStringList,
    },
    RuleSpec {
        id: "policy.metadata.change_ticket_required.bool",
        kind: ViolationKind::Metadata,
        message: "metadata.change_ticket_required must be a boolean",
        path: "metadata.change_ticket_required",
        check: RuleKind::Bool,
    },
    RuleSpec {
        id: "policy.metadata.emergency_use_only.bool",
        kind: ViolationKind::Metadata,
        message: "metadata.emergency_use_only must be a boolean",
        path: "metadata.emergency_use_only",
        check: RuleKind::Bool,
    },
];

/// Compiled inputs shared by every document of one load.
pub struct LintContext<'a> {
    pub naming: &'a Regex,
    pub semver: Regex,
    pub required_metadata: &'a [String],
    pub known_rings: &'a [RingName],
}

impl<'a> LintContext<'a> {
    pub fn new(
        naming: &'a Regex,
        required_metadata: &'a [String],
        known_rings: &'a [RingName],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            naming,
            semver: Regex::new(SEMVER_PATTERN)?,
            required_metadata,
            known_rings,
        })
    }
}

/// Lints one parsed document and returns every violation it carries.
#[must_use]
pub fn lint_document(path: &str, doc: &Value, ctx: &LintContext<'_>) -> Vec<PolicyViolation> {
    let mut out = Vec::new();
    let Some(root) = doc.as_object() else {
        out.push(PolicyViolation::new(
            ViolationKind::Schema,
            "policy.document.object",
            path,
            "document must be an object",
        ));
        return out;
    };
    let policy_id = root.get("name").and_then(Value::as_str);
    let mut push = |v: PolicyViolation| out.push(v.for_policy(policy_id));

    let missing: Vec<&str> = REQUIRED_TOP_LEVEL
        .iter()
        .copied()
        .filter(|k| !root.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        push(PolicyViolation::new(
            ViolationKind::Schema,
            "policy.fields.required",
            path,
            format!("missing top-level fields: {}", missing.join(", ")),
        ));
        return out;
    }

    for rule in DOCUMENT_RULES {
        if let Some(value) = field_path(doc, rule.path) {
            if !passes(value, rule.check, ctx) {
                push(PolicyViolation::new(
                    rule.kind,
                    rule.id,
                    path,
                    format!("{} (got {value})", rule.message),
                ));
            }
        }
    }

    if let Some(name) = policy_id {
        if !ctx.naming.is_match(name) {
            push(PolicyViolation::new(
                ViolationKind::Naming,
                "policy.name.pattern",
                path,
                format!("name `{name}` does not match {}", ctx.naming.as_str()),
            ));
        }
    }

    if let Some(metadata) = root.get("metadata").and_then(Value::as_object) {
        let missing: Vec<&str> = ctx
            .required_metadata
            .iter()
            .map(String::as_str)
            .filter(|k| !metadata.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            push(PolicyViolation::new(
                ViolationKind::Metadata,
                "policy.metadata.required",
                path,
                format!("missing metadata fields: {}", missing.join(", ")),
            ));
        }
    }

    if let Some(settings) = root.get("settings").and_then(Value::as_object) {
        if settings.keys().any(|k| k.trim().is_empty()) {
            push(PolicyViolation::new(
                ViolationKind::Schema,
                "policy.settings.key.non_empty",
                path,
                "settings keys must be non-empty strings",
            ));
        }
        if root.get("platform").and_then(Value::as_str) == Some(Platform::Macos.as_str())
            && settings.get("type").and_then(Value::as_str) == Some("jamf_configuration_profile")
        {
            let has_plist = settings
                .get("profile_plist_xml")
                .and_then(Value::as_str)
                .is_some_and(|xml| xml.trim_start().starts_with("<?xml"));
            if !has_plist {
                push(PolicyViolation::new(
                    ViolationKind::Schema,
                    "policy.settings.jamf_profile.plist",
                    path,
                    "macOS Jamf profile must include settings.profile_plist_xml containing plist XML",
                ));
            }
        }
    }

    for v in lint_scope(path, root.get("scope"), ctx) {
        push(v);
    }
    for v in lint_telemetry_expectations(path, root.get("telemetry_expectations")) {
        push(v);
    }
    if is_break_glass(root) {
        for v in lint_break_glass(path, root) {
            push(v);
        }
    }
    out
}

fn lint_scope(path: &str, scope: Option<&Value>, ctx: &LintContext<'_>) -> Vec<PolicyViolation> {
    let mut out = Vec::new();
    let Some(rings) = scope.and_then(|s| s.get("supported_rings")) else {
        return out;
    };
    let Some(list) = rings.as_array().filter(|l| !l.is_empty()) else {
        out.push(PolicyViolation::new(
            ViolationKind::Schema,
            "policy.scope.supported_rings.non_empty",
            path,
            "scope.supported_rings must be a non-empty list",
        ));
        return out;
    };
    let unknown: Vec<String> = list
        .iter()
        .filter(|r| {
            !r.as_str()
                .is_some_and(|name| ctx.known_rings.iter().any(|k| k.as_str() == name))
        })
        .map(Value::to_string)
        .collect();
    if !unknown.is_empty() {
        out.push(PolicyViolation::new(
            ViolationKind::Schema,
            "policy.scope.supported_rings.known",
            path,
            format!("scope.supported_rings contains unknown ring(s): {}", unknown.join(", ")),
        ));
    }
    out
}

fn lint_telemetry_expectations(path: &str, value: Option<&Value>) -> Vec<PolicyViolation> {
    let Some(map) = value.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| v.as_f64().is_some_and(|n| !(0.0..=1.0).contains(&n)))
        .map(|(k, v)| {
            PolicyViolation::new(
                ViolationKind::Schema,
                "policy.telemetry_expectations.unit_interval",
                path,
                format!("telemetry_expectations.{k} must be within [0, 1] (got {v})"),
            )
        })
        .collect()
}

fn is_break_glass(root: &serde_json::Map<String, Value>) -> bool {
    let named = root
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| BREAK_GLASS_NAMES.contains(&n));
    let flagged = root
        .get("metadata")
        .and_then(|m| m.get("emergency_use_only"))
        .and_then(Value::as_bool)
        == Some(true);
    named || flagged
}

fn lint_break_glass(path: &str, root: &serde_json::Map<String, Value>) -> Vec<PolicyViolation> {
    let mut out = Vec::new();
    let mut expect = |ok: bool, rule: &str, message: &str| {
        if !ok {
            out.push(PolicyViolation::new(ViolationKind::Metadata, rule, path, message));
        }
    };
    let meta = root.get("metadata");
    let meta_str = |key: &str| meta.and_then(|m| m.get(key)).and_then(Value::as_str);

    expect(
        meta_str("rollout_strategy") == Some(RolloutStrategy::ManualOnly.as_str()),
        "policy.break_glass.rollout_strategy",
        "break-glass must have rollout_strategy=manual-only",
    );
    expect(
        meta_str("risk_level") == Some(RiskTier::Critical.as_str()),
        "policy.break_glass.risk_level",
        "break-glass must have risk_level=critical",
    );
    expect(
        meta.and_then(|m| m.get("emergency_use_only")).and_then(Value::as_bool) == Some(true),
        "policy.break_glass.emergency_use_only",
        "break-glass must set metadata.emergency_use_only=true",
    );

    let tc = root.get("time_constraints");
    expect(
        tc.and_then(|t| t.get("auto_expire")).and_then(Value::as_bool) == Some(true),
        "policy.break_glass.auto_expire",
        "break-glass must enable time_constraints.auto_expire=true",
    );
    expect(
        tc.and_then(|t| t.get("max_duration_minutes"))
            .and_then(Value::as_u64)
            .is_some_and(|m| (1..=BREAK_GLASS_MAX_DURATION_MINUTES).contains(&m)),
        "policy.break_glass.max_duration_minutes",
        "break-glass time_constraints.max_duration_minutes must be an integer in 1..=240",
    );
    out
}

fn passes(value: &Value, check: RuleKind, ctx: &LintContext<'_>) -> bool {
    match check {
        RuleKind::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
        RuleKind::Semver => value.as_str().is_some_and(|s| ctx.semver.is_match(s)),
        RuleKind::Object => value.is_object(),
        RuleKind::Bool => value.is_boolean(),
        RuleKind::NonEmptyString => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        RuleKind::NonEmptyStringList => value
            .as_array()
            .is_some_and(|l| !l.is_empty() && l.iter().all(Value::is_string)),
    }
}

fn field_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        cur = cur.get(seg)?;
    }
    Some(cur)
}

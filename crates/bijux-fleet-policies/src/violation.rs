// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Schema,
    Naming,
    Metadata,
}

impl ViolationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema_error",
            Self::Naming => "naming_error",
            Self::Metadata => "metadata_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyViolation {
    pub kind: ViolationKind,
    pub rule: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub message: String,
}

impl PolicyViolation {
    #[must_use]
    pub fn new(kind: ViolationKind, rule: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule: rule.to_string(),
            path: path.to_string(),
            policy_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn for_policy(mut self, policy_id: Option<&str>) -> Self {
        self.policy_id = policy_id.map(str::to_string);
        self
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.path, self.kind.as_str(), self.message)?;
        if let Some(id) = &self.policy_id {
            write!(f, " (policy `{id}`)")?;
        }
        Ok(())
    }
}

/// Every violation found by one load, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValidationError {
    pub violations: Vec<PolicyViolation>,
}

impl PolicyValidationError {
    #[must_use]
    pub fn single(violation: PolicyViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    #[must_use]
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    /// Code of the first violation, used as the headline error code.
    #[must_use]
    pub fn primary_code(&self) -> &'static str {
        self.violations
            .first()
            .map_or(ViolationKind::Schema.as_str(), |v| v.kind.as_str())
    }
}

impl fmt::Display for PolicyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} policy violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PolicyValidationError {}

// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const POLICY_ID_MAX_LEN: usize = 128;
pub const RING_NAME_MAX_LEN: usize = 32;
pub const ATTEMPT_ID_MAX_LEN: usize = 64;

/// Policy identifier as it appears in `name`. Only structural sanity is
/// checked here; the configured naming pattern is a Policy Store lint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyId(String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RingName(String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttemptId(String);

impl PolicyId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError("policy id must not be empty".to_string()));
        }
        if value.len() > POLICY_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "policy id exceeds max length {POLICY_ID_MAX_LEN}"
            )));
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control() || c == '.') {
            return Err(ValidationError(format!(
                "policy id `{value}` must not contain whitespace, control characters or '.'"
            )));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RingName {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError("ring name must not be empty".to_string()));
        }
        if value.len() > RING_NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "ring name exceeds max length {RING_NAME_MAX_LEN}"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError(format!(
                "ring name `{value}` must contain only [a-z0-9_-]"
            )));
        }
        Ok(Self(value))
    }

    pub(crate) fn builtin(value: &'static str) -> Self {
        Self(value.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AttemptId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() || value.len() > ATTEMPT_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "attempt id must be 1..={ATTEMPT_ID_MAX_LEN} characters"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError(format!(
                "attempt id `{value}` must contain only [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(value))
    }

    /// Sequential id handed out by the attempt table.
    #[must_use]
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("att-{sequence:06}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, ValidationError> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, ValidationError> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, ValidationError> {
                Self::new(s)
            }
        }
    };
}

impl_id_traits!(PolicyId);
impl_id_traits!(RingName);
impl_id_traits!(AttemptId);

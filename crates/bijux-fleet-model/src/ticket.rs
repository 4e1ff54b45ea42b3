// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const CHANGE_TICKET_PATTERN: &str = r"^[A-Z][A-Z0-9]{1,15}-[0-9]{1,10}$";

/// Change-control record id such as `CAB-100` or `CHG-1234`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangeTicket(String);

impl ChangeTicket {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let pattern = Regex::new(CHANGE_TICKET_PATTERN)
            .map_err(|e| ValidationError(format!("change ticket pattern: {e}")))?;
        let trimmed = input.trim();
        if !pattern.is_match(trimmed) {
            return Err(ValidationError(format!(
                "change ticket `{input}` does not match {CHANGE_TICKET_PATTERN}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChangeTicket {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, ValidationError> {
        Self::parse(&value)
    }
}

impl From<ChangeTicket> for String {
    fn from(value: ChangeTicket) -> Self {
        value.0
    }
}

/// Answer from change control for one (ticket, ring) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TicketVerdict {
    Valid,
    Invalid { reason: String },
}

impl TicketVerdict {
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

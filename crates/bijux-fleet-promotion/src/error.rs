// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use bijux_fleet_model::ValidationError;
use bijux_fleet_store::{StoreError, StoreErrorCode};

/// Failures that prevent an attempt from being driven at all. Outcomes of a
/// driven attempt (gate rejection, apply failure, ...) live on the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionErrorCode {
    UnknownRing,
    NoPriorState,
    ApplyError,
    StateLocked,
    AuditChainBroken,
    Config,
    Internal,
}

impl PromotionErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownRing => "usage_error",
            Self::NoPriorState => "no_prior_state",
            Self::ApplyError => "apply_error",
            Self::StateLocked => "dependency_failure",
            Self::AuditChainBroken => "audit_chain_broken",
            Self::Config => "usage_error",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionError {
    pub code: PromotionErrorCode,
    pub message: String,
}

impl PromotionError {
    #[must_use]
    pub fn new(code: PromotionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(PromotionErrorCode::Internal, message)
    }
}

impl Display for PromotionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PromotionError {}

impl From<StoreError> for PromotionError {
    fn from(value: StoreError) -> Self {
        let code = match value.code {
            StoreErrorCode::Conflict => PromotionErrorCode::StateLocked,
            StoreErrorCode::ChainBroken => PromotionErrorCode::AuditChainBroken,
            _ => PromotionErrorCode::Internal,
        };
        Self::new(code, value.to_string())
    }
}

impl From<ValidationError> for PromotionError {
    fn from(value: ValidationError) -> Self {
        Self::internal(value.0)
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use bijux_fleet_core::Hash256;
use bijux_fleet_model::{LkgEntry, PromotionAttempt, RingName};

use crate::controller::{PromotionController, DEFAULT_APPLY_TIMEOUT};
use crate::error::PromotionError;

/// Reads and restores per-ring last-known-good state. Never invents a
/// state: a ring without an earlier applied set cannot be rolled back.
pub struct RollbackManager<'a> {
    controller: &'a PromotionController,
    apply_timeout: Duration,
}

impl<'a> RollbackManager<'a> {
    #[must_use]
    pub fn new(controller: &'a PromotionController) -> Self {
        Self {
            controller,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }

    pub fn last_good(&self, ring: &RingName) -> Result<Option<Hash256>, PromotionError> {
        self.controller.last_good(ring)
    }

    /// Applied history for `ring`, oldest first.
    pub fn history(&self, ring: &RingName) -> Result<Vec<LkgEntry>, PromotionError> {
        self.controller.last_good(ring)?;
        Ok(self.controller.state().lkg.snapshot()?.history(ring).to_vec())
    }

    pub fn rollback(&self, ring: &RingName, actor: &str) -> Result<PromotionAttempt, PromotionError> {
        self.controller.roll_back(ring, actor, self.apply_timeout)
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock access for the stateful layers. Drift and gate evaluation take
/// `now` as an argument and never read a clock themselves.
pub trait ClockPort: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl ClockPort for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Drift Detector. Pure functions only: no I/O, no clock, no globals.

mod diff;
mod normalize;

pub use diff::{diff, diff_desired, diff_managed, diff_states};
pub use normalize::{normalize_setting_value, values_equivalent};

pub const CRATE_NAME: &str = "bijux-fleet-drift";

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use bijux_fleet_core::Hash256;
use serde::{Deserialize, Serialize};

use crate::ids::{AttemptId, RingName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LkgEntry {
    pub policy_set_hash: Hash256,
    pub attempt_id: AttemptId,
    pub applied_at_epoch_seconds: u64,
}

/// Per-ring history of applied policy sets, newest last. The last entry is
/// the ring's last-known-good state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LastKnownGood {
    rings: BTreeMap<RingName, Vec<LkgEntry>>,
}

impl LastKnownGood {
    #[must_use]
    pub fn current(&self, ring: &RingName) -> Option<&LkgEntry> {
        self.rings.get(ring).and_then(|h| h.last())
    }

    /// Entry a rollback would restore.
    #[must_use]
    pub fn previous(&self, ring: &RingName) -> Option<&LkgEntry> {
        self.rings
            .get(ring)
            .and_then(|h| h.len().checked_sub(2).and_then(|i| h.get(i)))
    }

    #[must_use]
    pub fn history(&self, ring: &RingName) -> &[LkgEntry] {
        self.rings.get(ring).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Re-applying the current set refreshes the entry instead of stacking
    /// a duplicate, so a later rollback always lands on a different set.
    pub fn record_applied(&mut self, ring: &RingName, entry: LkgEntry) {
        let history = self.rings.entry(ring.clone()).or_default();
        match history.last_mut() {
            Some(last) if last.policy_set_hash == entry.policy_set_hash => *last = entry,
            _ => history.push(entry),
        }
    }

    /// Drops the current entry, making the previous one current.
    pub fn pop(&mut self, ring: &RingName) -> Option<LkgEntry> {
        self.rings.get_mut(ring).and_then(Vec::pop)
    }

    pub fn rings(&self) -> impl Iterator<Item = (&RingName, &[LkgEntry])> {
        self.rings.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::RingName;
use crate::ValidationError;

pub const DEFAULT_TELEMETRY_FRESHNESS_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredGates {
    #[serde(default)]
    pub change_ticket: bool,
    #[serde(default)]
    pub telemetry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ring {
    pub name: RingName,
    pub rank: u32,
    #[serde(default)]
    pub required_gates: RequiredGates,
    #[serde(default)]
    pub tolerate_drift: bool,
    #[serde(default = "default_freshness")]
    pub telemetry_freshness_secs: u64,
}

fn default_freshness() -> u64 {
    DEFAULT_TELEMETRY_FRESHNESS_SECS
}

impl Ring {
    #[must_use]
    pub fn new(name: RingName, rank: u32) -> Self {
        Self {
            name,
            rank,
            required_gates: RequiredGates::default(),
            tolerate_drift: false,
            telemetry_freshness_secs: DEFAULT_TELEMETRY_FRESHNESS_SECS,
        }
    }

    #[must_use]
    pub fn requiring_ticket(mut self) -> Self {
        self.required_gates.change_ticket = true;
        self
    }

    #[must_use]
    pub fn requiring_telemetry(mut self) -> Self {
        self.required_gates.telemetry = true;
        self
    }
}

/// Rings in strict rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RingCatalog {
    rings: Vec<Ring>,
}

impl RingCatalog {
    pub fn new(mut rings: Vec<Ring>) -> Result<Self, ValidationError> {
        if rings.is_empty() {
            return Err(ValidationError("ring catalog must not be empty".to_string()));
        }
        let mut names = BTreeSet::new();
        let mut ranks = BTreeSet::new();
        for ring in &rings {
            if !names.insert(ring.name.clone()) {
                return Err(ValidationError(format!("duplicate ring name `{}`", ring.name)));
            }
            if !ranks.insert(ring.rank) {
                return Err(ValidationError(format!(
                    "duplicate ring rank {} (ring `{}`)",
                    ring.rank, ring.name
                )));
            }
        }
        rings.sort_by_key(|r| r.rank);
        Ok(Self { rings })
    }

    /// qa < security < early < global.
    #[must_use]
    pub fn default_catalog() -> Self {
        let ring = |name: &'static str, rank: u32| Ring::new(RingName::builtin(name), rank);
        Self {
            rings: vec![
                ring("qa", 0),
                ring("security", 1).requiring_ticket(),
                ring("early", 2).requiring_ticket().requiring_telemetry(),
                ring("global", 3).requiring_ticket().requiring_telemetry(),
            ],
        }
    }

    #[must_use]
    pub fn get(&self, name: &RingName) -> Option<&Ring> {
        self.rings.iter().find(|r| &r.name == name)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Ring> {
        self.rings.iter().find(|r| r.name.as_str() == name)
    }

    /// Rings ranked strictly below `ring`, lowest first.
    pub fn lower_rings<'a>(&'a self, ring: &'a Ring) -> impl Iterator<Item = &'a Ring> + 'a {
        self.rings.iter().filter(move |r| r.rank < ring.rank)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ring> {
        self.rings.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<RingName> {
        self.rings.iter().map(|r| r.name.clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &RingName) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{Ring, RingCatalog};
    use crate::ids::RingName;

    fn ring(name: &str, rank: u32) -> Ring {
        Ring::new(RingName::new(name).expect("ring"), rank)
    }

    #[test]
    fn default_catalog_is_rank_ordered_with_gates() {
        let catalog = RingCatalog::default_catalog();
        let names: Vec<String> = catalog.names().into_iter().map(String::from).collect();
        assert_eq!(names, vec!["qa", "security", "early", "global"]);
        let qa = catalog.find("qa").expect("qa");
        assert!(!qa.required_gates.change_ticket);
        let global = catalog.find("global").expect("global");
        assert!(global.required_gates.change_ticket && global.required_gates.telemetry);
        assert!(catalog.iter().all(|r| !r.tolerate_drift));
    }

    #[test]
    fn catalog_sorts_and_rejects_duplicates() {
        let catalog = RingCatalog::new(vec![ring("global", 9), ring("qa", 1)]).expect("catalog");
        assert_eq!(catalog.iter().next().map(|r| r.name.as_str()), Some("qa"));
        assert!(RingCatalog::new(vec![ring("qa", 0), ring("qa", 1)]).is_err());
        assert!(RingCatalog::new(vec![ring("qa", 0), ring("global", 0)]).is_err());
        assert!(RingCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn lower_rings_excludes_self_and_higher() {
        let catalog = RingCatalog::default_catalog();
        let early = catalog.find("early").expect("early");
        let lower: Vec<&str> = catalog.lower_rings(early).map(|r| r.name.as_str()).collect();
        assert_eq!(lower, vec!["qa", "security"]);
    }
}

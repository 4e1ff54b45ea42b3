// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use bijux_fleet_core::Hash256;
use bijux_fleet_model::RingName;

use crate::error::PromotionError;

type LockMap<K> = Mutex<HashMap<K, Arc<Mutex<()>>>>;

/// Per-key mutual exclusion. Promotions take the policy-set lock first and
/// the ring lock second; rollbacks take only the ring lock.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    policy_sets: LockMap<Hash256>,
    rings: LockMap<RingName>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy_set(&self, hash: Hash256) -> Result<Arc<Mutex<()>>, PromotionError> {
        lock_for(&self.policy_sets, hash)
    }

    pub fn ring(&self, ring: &RingName) -> Result<Arc<Mutex<()>>, PromotionError> {
        lock_for(&self.rings, ring.clone())
    }
}

fn lock_for<K: Eq + Hash>(map: &LockMap<K>, key: K) -> Result<Arc<Mutex<()>>, PromotionError> {
    let mut map = map
        .lock()
        .map_err(|_| PromotionError::internal("keyed lock table poisoned"))?;
    Ok(Arc::clone(
        map.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))),
    ))
}

#[cfg(test)]
mod tests {
    use super::KeyedLocks;
    use bijux_fleet_core::sha256;
    use bijux_fleet_model::RingName;
    use std::sync::Arc;

    #[test]
    fn same_key_shares_one_mutex() {
        let locks = KeyedLocks::new();
        let a = locks.policy_set(sha256(b"p1")).expect("lock");
        let b = locks.policy_set(sha256(b"p1")).expect("lock");
        let c = locks.policy_set(sha256(b"p2")).expect("lock");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));

        let qa = RingName::new("qa").expect("ring");
        let held = locks.ring(&qa).expect("lock");
        let _guard = held.lock().expect("guard");
        assert!(locks.ring(&qa).expect("lock").try_lock().is_err());
        let global = RingName::new("global").expect("ring");
        assert!(locks.ring(&global).expect("lock").try_lock().is_ok());
    }
}

// SPDX-License-Identifier: Apache-2.0

use bijux_fleet_core::canonical;
use proptest::prelude::*;
use serde_json::json;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,24}"
}

proptest! {
    #[test]
    fn stable_hash_bytes_is_deterministic(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let h1 = canonical::stable_hash_hex(&payload);
        let h2 = canonical::stable_hash_hex(&payload);
        prop_assert_eq!(h1, h2);
    }

    #[test]
    fn stable_json_bytes_are_independent_of_object_key_order(a in key_strategy(), b in key_strategy(), av in any::<u32>(), bv in any::<u32>()) {
        prop_assume!(a != b);

        let left = json!({a.clone(): av, b.clone(): bv});
        let right = json!({b: bv, a: av});

        let left_bytes = canonical::stable_json_bytes(&left).expect("canonical left");
        let right_bytes = canonical::stable_json_bytes(&right).expect("canonical right");

        prop_assert_eq!(left_bytes, right_bytes);
    }

    #[test]
    fn integral_float_and_integer_hash_identically(n in -1_000_000_i64..1_000_000) {
        let as_int = json!({"v": n});
        let as_float = json!({"v": n as f64});
        prop_assert_eq!(
            canonical::stable_json_hash_hex(&as_int).expect("int hash"),
            canonical::stable_json_hash_hex(&as_float).expect("float hash")
        );
    }
}

#[test]
fn array_order_is_significant() {
    let a = canonical::stable_json_hash_hex(&json!([1, 2])).expect("hash a");
    let b = canonical::stable_json_hash_hex(&json!([2, 1])).expect("hash b");
    assert_ne!(a, b);
}

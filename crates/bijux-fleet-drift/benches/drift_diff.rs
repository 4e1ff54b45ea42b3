// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use bijux_fleet_drift::diff_states;
use bijux_fleet_model::{PolicyId, SettingMap};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

fn fleet_state(policies: usize, settings: usize, skew: u64) -> BTreeMap<PolicyId, SettingMap> {
    (0..policies)
        .map(|p| {
            let id = PolicyId::new(format!("policy-{p:04}")).expect("policy id");
            let body: SettingMap = (0..settings)
                .map(|s| {
                    let v = if s % 10 == 0 { skew } else { 1 };
                    (format!("setting_{s:03}"), json!(v.to_string()))
                })
                .collect();
            (id, body)
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let desired = fleet_state(500, 40, 1);
    let actual = fleet_state(500, 40, 2);
    c.bench_function("diff_states_500x40", |b| {
        b.iter(|| diff_states(black_box(&desired), black_box(&actual)))
    });
}

criterion_group!(benches, bench_diff);
criterion_main!(benches);

// SPDX-License-Identifier: Apache-2.0

use bijux_fleet_policies::{load_documents, PolicyStoreConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

fn documents(count: usize) -> Vec<(String, Value)> {
    (0..count)
        .map(|i| {
            let settings: serde_json::Map<String, Value> =
                (0..20).map(|k| (format!("setting_{k}"), json!(i * k))).collect();
            (
                format!("policies/p{i}.json"),
                json!({
                    "name": format!("policy-{i:04}"),
                    "platform": "windows",
                    "version": "1.0.0",
                    "metadata": {
                        "owner": "secops",
                        "approver_groups": ["cab"],
                        "change_ticket_required": false,
                        "risk_level": "low",
                        "rollout_strategy": "ringed",
                    },
                    "settings": settings,
                }),
            )
        })
        .collect()
}

fn bench_load_and_hash(c: &mut Criterion) {
    let docs = documents(200);
    let cfg = PolicyStoreConfig::default();
    c.bench_function("load_documents_200", |b| {
        b.iter(|| load_documents(black_box(&docs), &cfg).expect("valid policies"))
    });
}

criterion_group!(benches, bench_load_and_hash);
criterion_main!(benches);

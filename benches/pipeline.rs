//! Micro-benchmarks for the hot paths of the compile pipeline: path
//! expression parsing and the deep structural merge.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use yao_workshop::dsl::compiler::deep_merge;
use yao_workshop::dsl::path;

fn bench_parse_path(c: &mut Criterion) {
    c.bench_function("parse_path_dotted", |b| {
        b.iter(|| path::parse(black_box("table.columns[12].validations[0].message")))
    });
    c.bench_function("parse_path_fallback", |b| {
        b.iter(|| path::parse(black_box("a key outside the grammar")))
    });
}

fn bench_deep_merge(c: &mut Criterion) {
    let parent = json!({
        "table": "users",
        "columns": (0..64).map(|i| json!({"name": format!("col_{}", i), "type": "string"})).collect::<Vec<_>>(),
        "option": {"timestamps": true, "soft_deletes": false},
    });
    let child = json!({
        "columns": [{"name": "created_at", "type": "datetime"}],
        "option": {"soft_deletes": true},
        "indexes": [{"name": "idx_name", "columns": ["name"]}],
    });

    c.bench_function("deep_merge_model", |b| {
        b.iter(|| {
            let mut target = parent.clone();
            deep_merge(&mut target, black_box(&child));
            target
        })
    });
}

criterion_group!(benches, bench_parse_path, bench_deep_merge);
criterion_main!(benches);

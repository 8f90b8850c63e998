//! # Identity Benchmarks
//!
//! Performance benchmarks for CID/TID generation and schema inference.
//!
//! Run with: `cargo bench -p nbhd-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nbhd_core::{FrontmatterSample, generate_cid, generate_rkey, infer_schema};
use serde_json::{Value, json};
use std::hint::black_box;

/// A blog post record with a body of roughly `size` bytes.
fn blog_post(size: usize) -> Value {
    json!({
        "$type": "app.nbhd.blog.post",
        "title": "Benchmarking record identity",
        "content": "lorem ipsum ".repeat(size / 12),
        "frontmatter": {"tags": ["rust", "atproto"], "draft": false, "rating": 4.5},
        "createdAt": "2026-01-01T00:00:00Z",
    })
}

fn samples(count: usize) -> Vec<FrontmatterSample> {
    (0..count)
        .map(|i| {
            let value = json!({
                "title": format!("Post {i}"),
                "date": "2026-01-01",
                "tags": ["a", "b"],
                "draft": i % 3 == 0,
                "_filepath": format!("content/blog/{i}.md"),
            });
            value.as_object().cloned().unwrap_or_default()
        })
        .collect()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_generate_cid(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_cid");

    for size in [100, 1000, 10000].iter() {
        let value = blog_post(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(generate_cid(&value)));
        });
    }

    group.finish();
}

fn bench_generate_rkey(c: &mut Criterion) {
    c.bench_function("generate_rkey", |b| b.iter(|| black_box(generate_rkey())));
}

fn bench_infer_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_schema");

    for count in [10, 100, 1000].iter() {
        let samples = samples(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(infer_schema(&samples)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_generate_cid,
    bench_generate_rkey,
    bench_infer_schema,
);

criterion_main!(benches);

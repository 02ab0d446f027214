use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::Value;
use stargate_codec::{BuildOptions, ColumnData, ExtractOptions, RowSet, Transcoder, build_row, extract};

// ── Helpers ─────────────────────────────────────────────────

fn generate_rows(n: usize, encode: bool) -> Value {
    let rows = (0..n)
        .map(|i| {
            let columns = ColumnData::nested()
                .with("user", "id", i as u64)
                .with("user", "name", format!("User {i}"))
                .with("user", "status", if i % 2 == 0 { "active" } else { "rejected" })
                .with("stats", "age", (i % 80) as u64);
            build_row(&format!("row-{i}"), &columns, BuildOptions { timestamp: None, encode })
        })
        .collect::<Vec<_>>();
    RowSet::from(rows).to_value()
}

// ── Extract ─────────────────────────────────────────────────

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for n in [100, 1_000, 10_000] {
        let wire = generate_rows(n, false);
        group.bench_with_input(BenchmarkId::new("perfect", n), &wire, |b, wire| {
            b.iter(|| extract(wire, ExtractOptions::perfect()).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("flat", n), &wire, |b, wire| {
            b.iter(|| extract(wire, ExtractOptions::flat()).unwrap())
        });
    }
    group.finish();
}

// ── Decode ──────────────────────────────────────────────────

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = Transcoder::decoder();
    for n in [100, 1_000, 10_000] {
        let wire = generate_rows(n, true);
        group.bench_with_input(BenchmarkId::from_parameter(n), &wire, |b, wire| {
            b.iter(|| decoder.transcode(wire).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract, bench_decode);
criterion_main!(benches);

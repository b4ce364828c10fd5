//! 🧪 planner_bench.rs — is batching still instant at upstream-firehose scale?
//!
//! 🧠 Knowledge graph: `BatchPlanner::plan` runs once per graph per run and
//! touches no filesystem, so its cost is pure CPU over a `Vec<InputFile>` —
//! a textbook criterion target. Worth tracking because a future change to
//! the "hold back the last file" logic could accidentally turn the single
//! `pop()` into something quadratic.

use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patchsync::catalog::InputFile;
use patchsync::planner::BatchPlanner;

fn synthetic_files(n: usize) -> Vec<InputFile> {
    (0..n)
        .map(|i| InputFile {
            path: PathBuf::from(format!("rdfpatch-{i:014}")),
            filename: format!("rdfpatch-{i:014}"),
            timestamp: format!("2016-01-01T00:00:{:02}Z", i % 60),
        })
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let planner = BatchPlanner::new(500).unwrap();
    let mut group = c.benchmark_group("batch_planner");
    for size in [100usize, 10_000, 200_000] {
        let files = synthetic_files(size);
        group.bench_function(format!("plan_{size}_files"), |b| {
            b.iter(|| planner.plan(black_box(files.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);

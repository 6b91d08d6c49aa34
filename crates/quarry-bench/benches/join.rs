//! Join benchmarks for Quarry.
//!
//! Runs the same equality join under each physical strategy, plus a
//! three-way join that exercises join ordering.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_bench::utils::Fixture;
use quarry_common::PlannerConfig;

fn strategies() -> Vec<(&'static str, PlannerConfig)> {
    vec![
        ("nested_loop", PlannerConfig::default()),
        (
            "hash",
            PlannerConfig {
                allow_hash_join: true,
                ..Default::default()
            },
        ),
        (
            "symmetric_hash",
            PlannerConfig {
                symmetric_hash_threshold: 0,
                ..PlannerConfig::with_hash_joins()
            },
        ),
    ]
}

fn two_tables(planner: PlannerConfig, rows: usize) -> Fixture {
    let fixture = Fixture::new(planner).unwrap();
    fixture.table("l", rows, 1000, 1).unwrap();
    fixture.table("r", rows, 1000, 2).unwrap();
    fixture
}

/// Benchmark an equality join per strategy.
fn bench_equi_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/equi");
    group.sample_size(10);

    for size in [500, 2000].iter() {
        for (name, planner) in strategies() {
            let fixture = two_tables(planner, *size);
            group.throughput(Throughput::Elements(*size as u64 * 2));
            group.bench_with_input(BenchmarkId::new(name, size), size, |b, _| {
                b.iter(|| {
                    let outcome = fixture
                        .engine()
                        .run("SELECT l.v, r.v FROM l, r WHERE l.k = r.k")
                        .unwrap();
                    black_box(outcome.tuples)
                });
            });
        }
    }

    group.finish();
}

/// Benchmark a chain join where ordering matters.
fn bench_three_way(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/three_way");
    group.sample_size(10);

    let fixture = Fixture::new(PlannerConfig::with_hash_joins()).unwrap();
    fixture.table("a", 5000, 5000, 1).unwrap();
    fixture.table("b", 500, 50, 2).unwrap();
    fixture.table("c", 50, 50, 3).unwrap();
    let sql = "SELECT SUM(a.v) FROM a, b, c WHERE a.k = b.v AND b.k = c.k AND c.v < 25";

    group.bench_function("plan", |b| {
        b.iter(|| black_box(fixture.engine().compile(sql).unwrap().join_cost()));
    });
    group.bench_function("run", |b| {
        b.iter(|| black_box(fixture.engine().run(sql).unwrap().tuples));
    });

    group.finish();
}

criterion_group!(benches, bench_equi_join, bench_three_way);
criterion_main!(benches);

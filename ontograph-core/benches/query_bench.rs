//! Benchmarks for snapshot publishing and the query primitives.
//!
//! Uses a synthetic taxonomy: a tree with fan-out 8 plus one `related`
//! cross-link per concept.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ontograph_core::{
    Concept, ExpandOptions, RelationSpec, RelationType, UpdateCoordinator, UpdateOp,
};

const WORDS: [&str; 12] = [
    "learning", "graph", "network", "model", "signal", "theory", "vector", "logic", "memory",
    "search", "entropy", "kernel",
];

/// Build a batch describing `n` concepts.
fn taxonomy(n: usize) -> Vec<UpdateOp> {
    (0..n)
        .map(|i| {
            let label = format!("{} {} {i}", WORDS[i % WORDS.len()], WORDS[(i / 7) % WORDS.len()]);
            let concept = Concept::new(format!("c{i}"), label)
                .with_definition(format!("Concept about {}", WORDS[(i * 5) % WORDS.len()]));
            let mut relations = Vec::new();
            if i > 0 {
                relations.push(RelationSpec::new(RelationType::Broader, format!("c{}", (i - 1) / 8)));
            }
            if i > 1 {
                relations.push(RelationSpec::new(RelationType::Related, format!("c{}", i / 2)));
            }
            UpdateOp::upsert(concept, relations)
        })
        .collect()
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    for size in [1_000, 10_000] {
        let batch = taxonomy(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("bulk", size), &batch, |b, batch| {
            b.iter(|| {
                let coordinator = UpdateCoordinator::new();
                black_box(coordinator.apply(batch.clone()))
            })
        });
    }

    // Small batch against a large published graph: cost should track the
    // batch, not the graph
    let coordinator = UpdateCoordinator::new();
    coordinator.apply(taxonomy(10_000));
    group.bench_function("incremental_10k", |b| {
        b.iter(|| {
            black_box(coordinator.apply(vec![UpdateOp::upsert(
                Concept::new("c42", "Renamed concept"),
                vec![RelationSpec::new(RelationType::Broader, "c5")],
            )]))
        })
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let coordinator = UpdateCoordinator::new();
    coordinator.apply(taxonomy(10_000));
    let engine = coordinator.engine();

    let mut group = c.benchmark_group("query");

    group.bench_function("get_concept_by_label", |b| {
        b.iter(|| black_box(engine.get_concept("graph theory 4321")))
    });

    group.bench_function("search", |b| {
        b.iter(|| black_box(engine.search("learning theory", 20)))
    });

    for depth in [1, 2, 3] {
        let options = ExpandOptions::new()
            .with_relation_types(vec![RelationType::Broader, RelationType::Related])
            .with_max_depth(depth);
        group.bench_with_input(BenchmarkId::new("expand", depth), &options, |b, options| {
            b.iter(|| black_box(engine.expand_context("c9999", options)))
        });
    }

    group.bench_function("shortest_path", |b| {
        b.iter(|| black_box(engine.shortest_path("c9999", "c5000")))
    });

    group.finish();
}

criterion_group!(benches, bench_apply, bench_queries);
criterion_main!(benches);

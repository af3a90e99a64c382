use aotscope::indexer::{self, LoadKind};
use aotscope::model::{ElementId, ElementKind};
use aotscope::store::{Graph, Store};
use aotscope::subgraph::{self, Direction, TraversalOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const CLASSES: usize = 2_000;

/// Every class uses the next three through a Symbol, so the graph is one big cycle.
fn synthetic_graph() -> (Graph, ElementId) {
    let mut graph = Graph::new();
    let ids: Vec<ElementId> = (0..CLASSES)
        .map(|i| graph.get_or_create(&format!("bench.pkg{}.C{i}", i % 17), ElementKind::Class, None))
        .collect();
    // symbols link themselves to their class on creation
    let symbols: Vec<ElementId> = (0..CLASSES)
        .map(|i| graph.get_or_create(&format!("Lbench/pkg{}/C{i};", i % 17), ElementKind::Symbol, None))
        .collect();
    for (i, symbol) in symbols.iter().enumerate() {
        for step in 1..=3 {
            graph.add_reference(*symbol, symbols[(i + step) % CLASSES]);
        }
    }
    (graph, ids[0])
}

fn map_lines() -> Vec<String> {
    let mut lines = Vec::with_capacity(CLASSES * 2);
    for i in 0..CLASSES {
        lines.push(format!("0x{:016x}: @@ Class             520 bench.C{i}", 0x8_0000_0000u64 + i as u64 * 0x100));
        lines.push(format!(
            "0x{:016x}: @@ Method            88 void bench.C{i}.run()",
            0x8_1000_0000u64 + i as u64 * 0x100
        ));
    }
    lines
}

fn bench_build_tree(c: &mut Criterion) {
    let (graph, root) = synthetic_graph();
    let mut group = c.benchmark_group("build_tree");
    for level in [2, 4, 8] {
        let opts = TraversalOptions {
            kinds: vec![ElementKind::Class],
            level,
            max: None,
            ..TraversalOptions::default()
        };
        group.bench_function(format!("forward_level_{level}"), |b| {
            b.iter(|| black_box(subgraph::build_tree(black_box(&graph), root, &opts)))
        });
    }
    let reverse = TraversalOptions {
        kinds: vec![ElementKind::Class],
        level: 4,
        direction: Direction::Reverse,
        ..TraversalOptions::default()
    };
    group.bench_function("reverse_level_4", |b| {
        b.iter(|| black_box(subgraph::build_tree(black_box(&graph), root, &reverse)))
    });
    group.finish();
}

fn bench_map_ingest(c: &mut Criterion) {
    let lines = map_lines();
    c.bench_function("ingest_map_dump", |b| {
        b.iter(|| {
            let store = Store::new();
            let report = indexer::load_lines(&store, LoadKind::AotMap, lines.iter().map(String::as_str));
            black_box(report.lines)
        })
    });
}

criterion_group!(benches, bench_build_tree, bench_map_ingest);
criterion_main!(benches);

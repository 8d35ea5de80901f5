//! Benchmarks for wfx core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use wfx::core::resolver;
use wfx::core::types::Target;

/// An fx file with `n` targets, each depending on its predecessor.
fn chain_source(n: usize) -> String {
    let mut src = String::from("def helper(x):\n    return \"echo \" + x\n\n");
    for i in 0..n {
        if i == 0 {
            src.push_str("def t0000(fx):\n    cmd(helper(\"start\"))\n\n");
        } else {
            src.push_str(&format!(
                "def t{i:04}(fx, depends_on=[\"t{:04}\"]):\n    cmd(\"echo {i}\")\n    pipe(cmd(\"echo a\"), cmd(\"cat\"))\n\n",
                i - 1
            ));
        }
    }
    src
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_parse");
    for n in [10, 100, 500] {
        let src = chain_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let file = wfx::script::parse("make.fx", black_box(src)).unwrap();
                black_box(file);
            });
        });
    }
    group.finish();
}

fn bench_extract_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_targets");
    for n in [10, 100, 500] {
        let src = chain_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let module = wfx::parse_module("make.fx", black_box(src)).unwrap();
                black_box(module.list_targets().len());
            });
        });
    }
    group.finish();
}

fn bench_first_pass(c: &mut Criterion) {
    let src = chain_source(100);
    c.bench_function("first_pass_100", |b| {
        b.iter(|| {
            let module = wfx::parse_module("make.fx", black_box(&src)).unwrap();
            let engine = wfx::Engine::first_pass(module, wfx::EngineConfig::default()).unwrap();
            black_box(engine.list_targets().len());
        });
    });
}

fn bench_schedule(c: &mut Criterion) {
    // Linear chain plus a fan-in to the last node.
    let mut group = c.benchmark_group("schedule");
    for n in [10, 100, 1000] {
        let mut targets = IndexMap::new();
        for i in 0..n {
            let mut deps = Vec::new();
            if i > 0 {
                deps.push(format!("node-{:04}", i - 1));
            }
            if i > 1 && i % 7 == 0 {
                deps.push(format!("node-{:04}", i / 2));
            }
            targets.insert(format!("node-{i:04}"), Target::new(format!("node-{i:04}"), deps, 0));
        }
        let requested = vec![format!("node-{:04}", n - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(n), &targets, |b, targets| {
            b.iter(|| {
                let plan = resolver::schedule(black_box(targets), &requested).unwrap();
                black_box(plan);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_extract_targets,
    bench_first_pass,
    bench_schedule
);
criterion_main!(benches);

//! Benchmarks for batch resolution.
//!
//! Run with: cargo bench -p param-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use param_engine::{
    BatchResolver, Parameter, ParameterCatalog, RawExpression, RawInput, RawValue, ResolverConfig,
};

fn gpu_catalog() -> ParameterCatalog {
    ParameterCatalog::new(vec![
        Parameter::float("cuda_core", 0.0).with_bounds(0.0, 5000.0),
        Parameter::float("lifespan", 5.0).with_bounds(1.0, 10.0),
        Parameter::float("usage", 0.5).with_bounds(0.0, 1.0),
        Parameter::float("power", 250.0).with_bounds(0.0, 1000.0),
        Parameter::enumeration("architecture", "Pascal", ["Pascal", "Maxwell"]),
    ])
    .unwrap()
}

/// Input with `size` scenarios alternating between both architectures.
fn build_input(size: usize) -> RawInput {
    let architectures: Vec<RawExpression> = (0..size)
        .map(|i| RawExpression::from(if i % 2 == 0 { "Pascal" } else { "Maxwell" }))
        .collect();
    let usages: Vec<f64> = (0..size).map(|i| (i % 100) as f64 / 100.0).collect();

    let mut input = RawInput::new();
    input.insert("architecture".to_string(), RawValue::Sequence(architectures));
    input.insert("usage".to_string(), usages.into());
    input.insert(
        "cuda_core".to_string(),
        "piecewise((1000, architecture_Pascal), (100, true))".into(),
    );
    input.insert(
        "power".to_string(),
        RawValue::Single(RawExpression::branch(
            "architecture",
            [
                ("Pascal", RawExpression::from("cuda_core * 0.2 + usage * 50")),
                ("Maxwell", RawExpression::from("cuda_core * 0.9 + usage * 30")),
            ],
        )),
    );
    input.insert("lifespan".to_string(), "max(1, 10 - usage * 4)".into());
    input
}

fn bench_resolve(c: &mut Criterion) {
    let catalog = gpu_catalog();
    let mut group = c.benchmark_group("resolve_batch");

    for size in [10, 100, 1_000] {
        let input = build_input(size);

        for (label, config) in [
            ("parallel", ResolverConfig::default()),
            ("sequential", ResolverConfig::sequential()),
        ] {
            let resolver = BatchResolver::new(config);
            group.bench_with_input(BenchmarkId::new(label, size), &input, |b, input| {
                b.iter(|| black_box(resolver.resolve(&catalog, black_box(input)).unwrap()));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);

//! Benchmarks for STAR parsing and typed binding
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use himena_relion::job::ParticleRow;
use himena_relion::pipeline::{Pipeline, PipelineStar};
use himena_relion::star::{Loop, StarDocument, StarModel};

fn bench_document_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("star_document_parse");

    for size in [100, 1_000, 10_000].iter() {
        let text = Loop::<ParticleRow>::example(*size).to_star_string();
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| StarDocument::parse(black_box(text)).unwrap());
        });
    }

    group.finish();
}

fn bench_loop_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_loop_binding");

    for size in [100, 1_000, 10_000].iter() {
        let doc = StarDocument::parse(&Loop::<ParticleRow>::example(*size).to_star_string()).unwrap();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| Loop::<ParticleRow>::from_document(black_box(doc)).unwrap());
        });
    }

    group.finish();
}

fn bench_pipeline_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_load");

    for size in [10, 100, 1_000].iter() {
        let text = PipelineStar::example(*size).to_star_string();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| {
                let model = PipelineStar::validate_str(black_box(text)).unwrap();
                let pipeline = Pipeline::from_model(model, ".");
                pipeline.topological_order().map(|order| order.len()).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_document_parsing,
    bench_loop_binding,
    bench_pipeline_load
);
criterion_main!(benches);

//! Acoustic scoring benchmarks.
//!
//! Measures the Gaussian kernel and full senone scoring at the feature
//! dimensions typical for cepstral front ends.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lextree_decoder::acoustic::simd::weighted_sq_distance;
use lextree_decoder::acoustic::{LogMath, MixtureComponent, ModelBuilder, ScoreCache, Senone};
use lextree_decoder::config::AcousticConfig;
use std::sync::Arc;

fn feature(dim: usize) -> Vec<f32> {
    (0..dim).map(|i| (i as f32 * 0.37).sin()).collect()
}

/// Benchmark the weighted squared distance kernel
fn benchmark_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_sq_distance");

    for dim in [13usize, 39, 64, 128] {
        let x = feature(dim);
        let mean: Vec<f32> = x.iter().map(|v| v * 0.5).collect();
        let precision = vec![-0.5f32; dim];
        group.throughput(Throughput::Elements(dim as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, _| {
            b.iter(|| weighted_sq_distance(black_box(&x), black_box(&mean), black_box(&precision)))
        });
    }

    group.finish();
}

/// Benchmark a single Gaussian component
fn benchmark_component(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixture_component");
    let log_math = LogMath::default();

    for dim in [13usize, 39] {
        let mean: Arc<[f32]> = feature(dim).into();
        let variance: Arc<[f32]> = vec![0.8f32; dim].into();
        let component = MixtureComponent::new(mean, variance, log_math, 1e-4, 0.0).unwrap();
        let x = feature(dim).iter().map(|v| v + 0.1).collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, _| {
            b.iter(|| component.score(black_box(&x)))
        });
    }

    group.finish();
}

/// Benchmark senone scoring with and without the per-frame cache
fn benchmark_senone(c: &mut Criterion) {
    let mut group = c.benchmark_group("senone");
    let dim = 39;

    for gaussians in [4usize, 16, 32] {
        let mut builder = ModelBuilder::new(AcousticConfig::default()).unwrap();
        let ids: Vec<usize> = (0..gaussians)
            .map(|g| {
                let mean = feature(dim).iter().map(|v| v + g as f32 * 0.05).collect();
                builder.add_gaussian(mean, vec![1.0; dim]).unwrap()
            })
            .collect();
        let weights = vec![1.0 / gaussians as f32; gaussians];
        let senone_id = builder.add_senone(&ids, &weights).unwrap();
        let pools = builder.build().unwrap();
        let senone = pools.senones.get(senone_id).unwrap().clone();
        let x = feature(dim);

        group.bench_with_input(BenchmarkId::new("direct", gaussians), &gaussians, |b, _| {
            b.iter(|| senone.score(black_box(&x)))
        });

        let mut cache = ScoreCache::new();
        group.bench_with_input(BenchmarkId::new("cached_same_frame", gaussians), &gaussians, |b, _| {
            b.iter(|| cache.score(senone.as_ref(), black_box(0), black_box(&x)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_distance, benchmark_component, benchmark_senone);
criterion_main!(benches);

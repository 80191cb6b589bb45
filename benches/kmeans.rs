//! Benchmarks for centroid training and assignment.
//!
//! Assignment dominates the build: every k-means iteration, the residual
//! calibration pass, and every chunk funnel through it.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::prelude::*;

use weft::backend::{CpuBackend, VectorBackend};
use weft::kmeans::KMeans;

fn normalized_vectors(n: usize, dim: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut flat = Vec::with_capacity(n * dim);
    for _ in 0..n {
        let v: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        flat.extend(v.iter().map(|x| x / norm));
    }
    flat
}

fn bench_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_centroids");
    let dim = 128;

    for &k in &[64usize, 256, 1024] {
        let vectors = normalized_vectors(2_048, dim);
        let centroids = normalized_vectors(k, dim);

        group.throughput(Throughput::Elements(2_048));
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |bench, _| {
            bench.iter(|| {
                CpuBackend.nearest_centroids(black_box(&vectors), black_box(&centroids), dim)
            });
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_fit");
    group.sample_size(10);
    let dim = 128;
    let vectors = normalized_vectors(8_192, dim);

    for &k in &[64usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |bench, _| {
            bench.iter(|| {
                let mut km = KMeans::new(dim, k, 4).unwrap();
                let mut rng = StdRng::seed_from_u64(7);
                km.fit(black_box(&vectors), &mut rng, &CpuBackend).unwrap();
                km.into_centroids()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_assignment, bench_training);
criterion_main!(benches);

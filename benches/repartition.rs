//! Repartition cost across target resolutions.
//!
//! Each iteration builds the basis matrix, samples the source model at the
//! new knots and runs one LU solve with `input_dim * output_dim` right-hand
//! sides.

use abel_spline::{AbelConfig, AbelSpline, SplineAnn, SplineConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_spline_repartition(c: &mut Criterion) {
    let model = SplineAnn::new(SplineConfig::new(2, 1, 5, 55)).unwrap();
    let mut group = c.benchmark_group("repartition/spline");

    for &z in &[5_usize, 10, 20, 40] {
        group.bench_with_input(BenchmarkId::from_parameter(z), &z, |b, &z| {
            b.iter(|| model.repartition(black_box(z)).unwrap());
        });
    }

    group.finish();
}

fn bench_abel_repartition(c: &mut Criterion) {
    let model = AbelSpline::new(AbelConfig {
        partition_num: 5,
        ..Default::default()
    })
    .unwrap();
    let mut group = c.benchmark_group("repartition/abel");

    for &z in &[10_usize, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(z), &z, |b, &z| {
            b.iter(|| model.repartition(black_box(z)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spline_repartition, bench_abel_repartition);
criterion_main!(benches);

//! Benchmarks for the hazard pipelines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hazmap_algorithms::classification::{classify, ClassificationScheme};
use hazmap_algorithms::flood::{detect_floods, FloodParams};
use hazmap_algorithms::pipeline::run_multi_hazard;
use hazmap_algorithms::segmentation::otsu_threshold;
use hazmap_algorithms::terrain::TerrainDerivatives;
use hazmap_algorithms::vectorize::vectorize;
use hazmap_core::{GeoTransform, HazardConfig, Raster};

fn create_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            dem.set(row, col, base + variation).unwrap();
        }
    }
    dem
}

/// Backscatter with a dark river band across the scene
fn create_sar(size: usize) -> Raster<f64> {
    let mut sar = Raster::new(size, size);
    for row in 0..size {
        for col in 0..size {
            let d = (row as isize - col as isize / 2 - size as isize / 4).abs();
            let noise = ((row * 31 + col * 17) % 40) as f64 / 10.0;
            let v = if d < (size / 16) as isize { -22.0 } else { -7.0 };
            sar.set(row, col, v + noise).unwrap();
        }
    }
    sar
}

fn unit(dem: &Raster<f64>) -> Raster<f64> {
    let max = (2 * dem.rows()) as f64 + 10.0;
    dem.derive(dem.data().mapv(|v| v / max), None).unwrap()
}

fn bench_terrain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/terrain");
    for size in [256, 512, 1024] {
        let dem = create_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| TerrainDerivatives::compute(black_box(&dem), 30.0).unwrap())
        });
    }
    group.finish();
}

fn bench_otsu(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/otsu");
    for size in [256, 1024] {
        let sar = create_sar(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| otsu_threshold(black_box(&sar)).unwrap())
        });
    }
    group.finish();
}

fn bench_flood(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/flood");
    for size in [256, 512, 1024] {
        let sar = create_sar(size);
        let dem = create_dem(size);
        let params = FloodParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| detect_floods(black_box(&sar), &dem, &params).unwrap())
        });
    }
    group.finish();
}

fn bench_classify_vectorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/classify_vectorize");
    let scheme = ClassificationScheme::default();
    for size in [128, 256, 512] {
        let values = unit(&create_dem(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let classes = classify(black_box(&values), &scheme).unwrap();
                vectorize(&classes, &scheme.label_names()).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_multi_hazard(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/multi_hazard");
    let config = HazardConfig::default();
    for size in [128, 256] {
        let landslide = unit(&create_dem(size));
        let flood = create_sar(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| run_multi_hazard(black_box(&landslide), &flood, None, &config).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_terrain,
    bench_otsu,
    bench_flood,
    bench_classify_vectorize,
    bench_multi_hazard,
);
criterion_main!(benches);

//! Benchmarks for binary morphology

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hazmap_algorithms::morphology::{clean, closing, dilate, erode, opening, StructuringElement};
use hazmap_core::{GeoTransform, Raster};

fn create_test_mask(size: usize) -> Raster<u8> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    // Blobs with ragged edges and isolated specks
    for row in 0..size {
        for col in 0..size {
            let v = ((row * 7 + col * 13) % 256) < 110;
            r.set(row, col, u8::from(v)).unwrap();
        }
    }
    r
}

fn bench_erode(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/erode");
    let se = StructuringElement::Cross(1);
    for size in [256, 512, 1024, 2048] {
        let mask = create_test_mask(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| erode(black_box(&mask), &se, 1).unwrap())
        });
    }
    group.finish();
}

fn bench_dilate(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/dilate");
    let se = StructuringElement::Cross(1);
    for size in [256, 512, 1024, 2048] {
        let mask = create_test_mask(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| dilate(black_box(&mask), &se, 1).unwrap())
        });
    }
    group.finish();
}

fn bench_opening_closing(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/open_close");
    let se = StructuringElement::Cross(1);
    let mask = create_test_mask(1024);
    group.bench_function("opening", |b| b.iter(|| opening(black_box(&mask), &se, 1).unwrap()));
    group.bench_function("closing", |b| b.iter(|| closing(black_box(&mask), &se, 1).unwrap()));
    group.finish();
}

fn bench_clean_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/clean_kernel");
    let mask = create_test_mask(1024);
    for kernel in [1, 3, 5] {
        group.bench_with_input(BenchmarkId::from_parameter(kernel), &kernel, |b, &k| {
            b.iter(|| clean(black_box(&mask), k).unwrap())
        });
    }
    group.finish();
}

fn bench_se_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/erode_shapes");
    let mask = create_test_mask(1024);
    let shapes: Vec<(&str, StructuringElement)> = vec![
        ("cross_3", StructuringElement::Cross(1)),
        ("square_3", StructuringElement::Square(1)),
        ("disk_5", StructuringElement::Disk(2)),
    ];
    for (name, se) in &shapes {
        group.bench_with_input(BenchmarkId::new("shape", name), name, |b, _| {
            b.iter(|| erode(black_box(&mask), se, 1).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_erode,
    bench_dilate,
    bench_opening_closing,
    bench_clean_kernel,
    bench_se_shapes,
);
criterion_main!(benches);

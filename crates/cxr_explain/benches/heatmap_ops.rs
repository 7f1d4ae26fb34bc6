//! Benchmarks for the heatmap post-processing path.
//!
//! Run with: cargo bench -p cxr_explain --bench heatmap_ops

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cxr_core::GrayscaleImage;
use cxr_explain::heatmap::{resize, threshold, to_sparse};
use cxr_explain::{ClassActivationMap, OverlayRenderer};
use ndarray::Array2;

fn synthetic_cam(side: usize) -> ClassActivationMap {
    let raw = Array2::from_shape_fn((side, side), |(y, x)| ((x * 31 + y * 17) % 97) as f32);
    ClassActivationMap::from_raw(raw)
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize");
    let cam = synthetic_cam(7);

    for size in [224usize, 512, 1024].iter() {
        group.throughput(Throughput::Elements((*size * *size) as u64));
        group.bench_with_input(BenchmarkId::new("bilinear", size), size, |bench, &size| {
            bench.iter(|| resize(black_box(cam.values()), size, size).unwrap())
        });
    }

    group.finish();
}

fn bench_postprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");
    let side = 1024usize;
    let heatmap = resize(synthetic_cam(7).values(), side, side).unwrap();
    let image = GrayscaleImage::filled(side as u32, side as u32, 128);
    let renderer = OverlayRenderer::default();

    group.throughput(Throughput::Elements((side * side) as u64));
    group.bench_function("threshold", |bench| {
        bench.iter(|| threshold(black_box(&heatmap), 0.1).unwrap())
    });
    group.bench_function("to_sparse", |bench| bench.iter(|| to_sparse(black_box(&heatmap))));
    group.bench_function("overlay", |bench| {
        bench.iter(|| renderer.render(black_box(&image), black_box(&heatmap)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_resize, bench_postprocess);
criterion_main!(benches);

use criterion::{black_box, criterion_group, Criterion};
use lazy_static::lazy_static;
use ndarray::Array4;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Duration;
use vision_predictors::{interpolate::bilinear, service::StrideResize};

lazy_static! {
    static ref THREAD_POOL_1: ThreadPool = ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .expect("Unable to create ThreadPool");
    static ref THREAD_POOL_4: ThreadPool = ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("Unable to create ThreadPool");
}

fn camera_frame() -> Array4<f32> {
    Array4::from_shape_fn((1, 3, 480, 640), |(_, c, y, x)| {
        ((c * 7 + y * 3 + x) % 255) as f32 / 255.0
    })
}

fn bench_stride_resize(c: &mut Criterion) {
    let frame = camera_frame();
    let resize = StrideResize::default();

    let mut group = c.benchmark_group("Stride resize");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("640x480 single thread", |b| {
        b.iter(|| resize.apply(black_box(&frame), &THREAD_POOL_1).unwrap())
    });
    group.bench_function("640x480 four threads", |b| {
        b.iter(|| resize.apply(black_box(&frame), &THREAD_POOL_4).unwrap())
    });
    group.finish();
}

fn bench_depth_upsample(c: &mut Criterion) {
    let depth = Array4::from_elem((1, 1, 518, 700), 1.5_f32);

    let mut group = c.benchmark_group("Depth upsample");
    group.bench_function("518x700 to 1080x1920", |b| {
        b.iter(|| bilinear(black_box(&depth), (1080, 1920), &THREAD_POOL_1))
    });
    group.finish();
}

criterion_group!(interpolations, bench_stride_resize, bench_depth_upsample);

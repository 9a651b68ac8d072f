use criterion::{black_box, criterion_group, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array2;
use rayon::ThreadPoolBuilder;
use vision_predictors::{
    colormap::visualize_depth,
    service::{
        prepare::{classification_preprocessing, depth_preprocessing, postprocessing},
        ClassifierPreset, StrideResize,
    },
};

fn photo() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(1280, 960, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn bench_preprocessing(c: &mut Criterion) {
    let image = photo();
    let transform = ClassifierPreset::ConvNext.transform();
    let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let resize = StrideResize::default();

    let mut group = c.benchmark_group("Preprocessing");
    group.sample_size(20);
    group.bench_function("Classification 1280x960", |b| {
        b.iter(|| classification_preprocessing(black_box(&image), &transform).unwrap())
    });
    group.bench_function("Depth 1280x960", |b| {
        b.iter(|| depth_preprocessing(black_box(&image), &resize, &pool).unwrap())
    });
    group.finish();
}

fn bench_postprocessing(c: &mut Criterion) {
    let logits = Array2::from_shape_fn((8, 1000), |(b, i)| ((b * 13 + i * 7) % 97) as f32 / 10.0);
    let depth = Array2::from_shape_fn((960, 1280), |(y, x)| (x + y) as f32 / 100.0);

    let mut group = c.benchmark_group("Postprocessing");
    group.bench_function("Softmax 8x1000", |b| {
        b.iter(|| postprocessing(black_box(logits.clone())))
    });
    group.bench_function("Inferno 1280x960", |b| {
        b.iter(|| visualize_depth(black_box(&depth)))
    });
    group.finish();
}

criterion_group!(pipelines, bench_preprocessing, bench_postprocessing);

pub mod bench_interpolation;
pub mod bench_pipeline;

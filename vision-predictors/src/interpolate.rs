//! # Bilinear interpolation
//!
//! Resampling of NCHW tensors with the `align_corners = false` convention: destination pixel
//! centers are mapped back onto source pixel centers, so the sample position of output index `i`
//! is `(i + 0.5) * in / out - 0.5` (clamped at 0), not `i * in / out`.
//!
//! Every `(batch, channel)` plane is independent, so planes are resampled in parallel on the
//! given thread pool.
use ndarray::{Array4, ArrayView2, ArrayViewMut2, Axis, Zip};
use rayon::ThreadPool;

/// The two source indices contributing to one destination index, with their weights.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    i0: usize,
    i1: usize,
    w0: f32,
    w1: f32,
}

fn axis_taps(input_len: usize, output_len: usize) -> Vec<Tap> {
    let scale = input_len as f32 / output_len as f32;
    let last = input_len - 1;

    (0..output_len)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = usize::min(src as usize, last);
            let i1 = if i0 < last { i0 + 1 } else { i0 };
            let lambda = src - i0 as f32;
            Tap {
                i0,
                i1,
                w0: 1.0 - lambda,
                w1: lambda,
            }
        })
        .collect()
}

fn resample_plane(input: ArrayView2<f32>, mut output: ArrayViewMut2<f32>, rows: &[Tap], cols: &[Tap]) {
    for (y, row) in rows.iter().enumerate() {
        for (x, col) in cols.iter().enumerate() {
            let top = col.w0 * input[[row.i0, col.i0]] + col.w1 * input[[row.i0, col.i1]];
            let bottom = col.w0 * input[[row.i1, col.i0]] + col.w1 * input[[row.i1, col.i1]];
            output[[y, x]] = row.w0 * top + row.w1 * bottom;
        }
    }
}

/// Resample every plane of an NCHW tensor to `(out_height, out_width)`.
///
/// Resampling to the input size returns a copy of the input.
/// An input with an empty spatial axis produces a zero-filled output.
pub fn bilinear(
    input: &Array4<f32>,
    (out_height, out_width): (usize, usize),
    thread_pool: &ThreadPool,
) -> Array4<f32> {
    let (batch, channels, in_height, in_width) = input.dim();
    let mut output = Array4::zeros((batch, channels, out_height, out_width));

    if (in_height, in_width) == (out_height, out_width) {
        output.assign(input);
        return output;
    }
    if in_height == 0 || in_width == 0 || out_height == 0 || out_width == 0 {
        return output;
    }

    let rows = axis_taps(in_height, out_height);
    let cols = axis_taps(in_width, out_width);

    thread_pool.install(|| {
        for (mut out_batch, in_batch) in output.outer_iter_mut().zip(input.outer_iter()) {
            Zip::from(out_batch.axis_iter_mut(Axis(0)))
                .and(in_batch.axis_iter(Axis(0)))
                .par_for_each(|out_plane, in_plane| {
                    resample_plane(in_plane, out_plane, &rows, &cols)
                });
        }
    });

    output
}

//! # Depth visualization
//!
//! Depth maps are min-max normalized to `[0, 255]` and mapped through the perceptual
//! "inferno" colormap (black, through purple and orange, to pale yellow).
//!
//! The lookup table is evaluated once from a degree-6 polynomial fit of matplotlib's inferno
//! map and produces RGB triples directly, so no channel reordering is needed before display.
//! The fit stays within a few levels of the 256-entry reference table.
use image::{Rgb, RgbImage};
use lazy_static::lazy_static;
use ndarray::Array2;

/// Polynomial coefficients of the inferno fit, lowest degree first, per RGB channel.
const INFERNO_COEFFICIENTS: [[f64; 3]; 7] = [
    [0.0002189403691192265, 0.001651004631001012, -0.01948089843709184],
    [0.1065134194856116, 0.5639564367884091, 3.932712388889277],
    [11.60249308247187, -3.972853965665698, -15.9423941062914],
    [-41.70399613139459, 17.43639888205313, 44.35414519872813],
    [77.162935699427, -33.40235894210092, -81.80730925738993],
    [-71.31942824499214, 32.62606426397723, 73.20951985803202],
    [25.13112622477341, -12.24266895238567, -23.07032500287172],
];

lazy_static! {
    /// The inferno colormap, indexed by an 8-bit intensity.
    pub static ref INFERNO: [[u8; 3]; 256] = {
        let mut table = [[0u8; 3]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let t = i as f64 / 255.0;
            for (channel, value) in entry.iter_mut().enumerate() {
                // Horner evaluation from the highest degree down
                let level = INFERNO_COEFFICIENTS
                    .iter()
                    .rev()
                    .fold(0.0, |acc, c| acc * t + c[channel]);
                *value = (level.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        table
    };
}

/// Min-max normalize a depth map to `[0, 255]`.
///
/// Values are truncated towards zero. A constant map has no range and becomes all zeros.
pub fn normalize_depth(depth: &Array2<f32>) -> Array2<u8> {
    let min = depth.iter().copied().fold(f32::INFINITY, f32::min);
    let max = depth.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if range <= 0.0 || !range.is_finite() {
        return Array2::zeros(depth.dim());
    }

    depth.mapv(|d| ((d - min) / range * 255.0) as u8)
}

/// Colorize a depth map with the inferno colormap.
pub fn visualize_depth(depth: &Array2<f32>) -> RgbImage {
    let intensities = normalize_depth(depth);
    let (height, width) = intensities.dim();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        Rgb(INFERNO[intensities[[y as usize, x as usize]] as usize])
    })
}

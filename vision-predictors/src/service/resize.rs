//! Aspect-ratio preserving resize with stride alignment.
//!
//! Patch based backbones (ViT-L/14 for Depth Anything) need input sides that are a multiple of
//! their patch size. The image is scaled so that it covers the target size on both axes, then
//! each side is rounded up to the next multiple of the stride.

use log::debug;
use ndarray::Array4;
use rayon::ThreadPool;

use crate::interpolate::bilinear;

use super::ServiceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrideResize {
    target_height: usize,
    target_width: usize,
    multiple_of: usize,
}

impl Default for StrideResize {
    fn default() -> Self {
        Self {
            target_height: 518,
            target_width: 518,
            multiple_of: 14,
        }
    }
}

impl StrideResize {
    pub fn new(
        target_height: usize,
        target_width: usize,
        multiple_of: usize,
    ) -> Result<Self, ServiceError> {
        if multiple_of == 0 {
            return Err(ServiceError::InvalidConfig("multiple_of must be greater than 0"));
        }
        if target_height == 0 || target_width == 0 {
            return Err(ServiceError::InvalidConfig("the target size must not be empty"));
        }
        Ok(Self {
            target_height,
            target_width,
            multiple_of,
        })
    }

    pub fn target_height(&self) -> usize {
        self.target_height
    }

    pub fn target_width(&self) -> usize {
        self.target_width
    }

    pub fn multiple_of(&self) -> usize {
        self.multiple_of
    }

    /// Computes the `(height, width)` an image of the given size is resized to.
    ///
    /// The larger of the two scale factors is used, so both target sides are met or exceeded.
    /// Scaled sides are truncated, rounded up to a multiple of the stride and finally
    /// clamped to the target size.
    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize), ServiceError> {
        if height == 0 || width == 0 {
            return Err(ServiceError::EmptyImage { width, height });
        }

        let scale_height = self.target_height as f64 / height as f64;
        let scale_width = self.target_width as f64 / width as f64;
        let scale = if scale_width > scale_height {
            scale_width
        } else {
            scale_height
        };

        let new_height = (scale * height as f64) as usize;
        let new_width = (scale * width as f64) as usize;

        let new_height = new_height.div_ceil(self.multiple_of) * self.multiple_of;
        let new_width = new_width.div_ceil(self.multiple_of) * self.multiple_of;

        Ok((
            usize::max(new_height, self.target_height),
            usize::max(new_width, self.target_width),
        ))
    }

    /// Resizes an NCHW batch with bilinear interpolation.
    pub fn apply(
        &self,
        tensor: &Array4<f32>,
        thread_pool: &ThreadPool,
    ) -> Result<Array4<f32>, ServiceError> {
        let (_, _, height, width) = tensor.dim();
        let size = self.output_size(height, width)?;
        debug!("Resizing {}x{} input to {}x{}", height, width, size.0, size.1);
        Ok(bilinear(tensor, size, thread_pool))
    }
}

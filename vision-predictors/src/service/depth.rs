use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use log::{debug, info};
use ndarray::{Array2, Array4, ArrayD, Axis};
use rayon::ThreadPool;

use crate::{
    interpolate::bilinear,
    manifest::{PredictorManifest, DEPTH_ANYTHING},
    providers::{DefaultProvider, Provider},
};

use super::{prepare::depth_preprocessing, resize::StrideResize, Config, ServiceError};

/// Estimates a dense depth map from a single image.
pub struct DepthEstimator<P: Provider = DefaultProvider> {
    provider: P,
    stride_resize: StrideResize,
    thread_pool: ThreadPool,
}

impl<P: Provider> DepthEstimator<P> {
    pub fn with_provider(
        provider: P,
        stride_resize: StrideResize,
        config: Config,
    ) -> Result<Self, ServiceError> {
        info!(
            "Creating depth estimator on provider {} ({:?})",
            provider.name(),
            stride_resize
        );
        Ok(Self {
            provider,
            stride_resize,
            thread_pool: config.thread_pool()?,
        })
    }

    pub fn manifest(&self) -> &'static PredictorManifest {
        &DEPTH_ANYTHING
    }

    pub fn stride_resize(&self) -> &StrideResize {
        &self.stride_resize
    }

    /// Estimates the depth of every pixel of the image.
    ///
    /// The result is shaped `[height, width]` like the input image, whatever size the
    /// model was run at.
    pub fn estimate_depth(&self, image: &DynamicImage) -> Result<Array2<f32>, ServiceError> {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);

        let input = depth_preprocessing(image, &self.stride_resize, &self.thread_pool)?;
        let now = Instant::now();
        let output = self.provider.run(input.into_dyn())?;
        debug!("Depth forward pass took {:.2?}", now.elapsed());

        let depth_batch = as_depth_batch(output)?;
        let depth = bilinear(&depth_batch, (height, width), &self.thread_pool);
        Ok(depth.index_axis_move(Axis(0), 0).index_axis_move(Axis(0), 0))
    }
}

/// Reshapes a raw depth output into a `[1, 1, height, width]` batch.
fn as_depth_batch(output: ArrayD<f32>) -> Result<Array4<f32>, ServiceError> {
    let shape = output.shape().to_vec();
    let (height, width) = match shape.as_slice() {
        [height, width] | [1, height, width] | [1, 1, height, width] => (*height, *width),
        _ => return Err(ServiceError::UnsupportedDepthShape(shape)),
    };
    // the output of a provider may not be contiguous
    let output = output.as_standard_layout().into_owned();
    Ok(output.into_shape((1, 1, height, width))?)
}

use std::path::Path;

use image::DynamicImage;
use rayon::ThreadPool;

use super::{
    prepare::{batch_classification_preprocessing, ClassifierTransform},
    ServiceError,
};

/// Read an image from the given path.
pub fn read_image<P>(path: P) -> Result<DynamicImage, ServiceError>
where
    P: AsRef<Path>,
{
    image::open(path).map_err(|e| ServiceError::InvalidInput(Box::new(e)))
}

/// Read multiple images, failing on the first one that cannot be decoded.
pub fn read_images<P>(paths: &[P]) -> Result<Vec<DynamicImage>, ServiceError>
where
    P: AsRef<Path>,
{
    paths.iter().map(read_image).collect()
}

/// Read and prepare images for classification.
///
/// It will load the images from the given paths, preprocess them and return an array4.
pub fn read_and_prepare_images<P>(
    paths: &[P],
    transform: &ClassifierTransform,
    thread_pool: &ThreadPool,
) -> Result<ndarray::Array4<f32>, ServiceError>
where
    P: AsRef<Path>,
{
    let images = read_images(paths)?;
    batch_classification_preprocessing(images.as_slice(), transform, thread_pool)
}

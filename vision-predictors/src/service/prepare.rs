use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::{arr1, Array2, Array3, Array4, Axis};
use rayon::{prelude::*, ThreadPool};

use super::{resize::StrideResize, ServiceError};

/// Mean of the ImageNet dataset, per RGB channel.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Standard deviation of the ImageNet dataset, per RGB channel.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize and crop applied to images before classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierTransform {
    /// Size of the shorter side after resizing.
    pub resize_size: u32,
    /// Side of the square center crop fed to the model.
    pub crop_size: u32,
}

/// Preprocess a single image for classification.
///
/// It will always add a batch dimension equal to 1 to the result.
pub fn classification_preprocessing(
    image: &DynamicImage,
    transform: &ClassifierTransform,
) -> Result<Array4<f32>, ServiceError> {
    let tensor = single_classification_preprocessing(image, transform)?;
    Ok(normalize(
        tensor.insert_axis(Axis(0)),
        IMAGENET_MEAN,
        IMAGENET_STD,
    ))
}

/// Preprocess an image batch for classification.
///
/// It will add a batch dimension equal to the number of images to the result.
/// Images are prepared in parallel on the given thread pool.
pub fn batch_classification_preprocessing(
    images: &[DynamicImage],
    transform: &ClassifierTransform,
    thread_pool: &ThreadPool,
) -> Result<Array4<f32>, ServiceError> {
    let side = transform.crop_size as usize;
    let tensors = thread_pool.install(|| {
        images
            .par_iter()
            .map(|image| single_classification_preprocessing(image, transform))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let batch = Array4::from_shape_vec(
        (images.len(), 3, side, side),
        tensors.into_iter().flatten().collect(),
    )?;
    Ok(normalize(batch, IMAGENET_MEAN, IMAGENET_STD))
}

/// Preprocess an image for depth estimation.
///
/// The image is converted to a tensor, resized with the given stride policy and normalized.
/// The result has a batch dimension equal to 1.
pub fn depth_preprocessing(
    image: &DynamicImage,
    stride_resize: &StrideResize,
    thread_pool: &ThreadPool,
) -> Result<Array4<f32>, ServiceError> {
    let image = image.to_rgb8();
    let tensor = to_tensor(&image).insert_axis(Axis(0));
    let resized = stride_resize.apply(&tensor, thread_pool)?;
    Ok(normalize(resized, IMAGENET_MEAN, IMAGENET_STD))
}

/// Postprocess the output of a classifier.
///
/// This will apply a softmax function on the last axis of the scores.
pub fn postprocessing(tensor: Array2<f32>) -> Array2<f32> {
    // subtracting the row maximum keeps exp() finite for large logits
    let max = tensor.fold_axis(Axis(1), f32::NEG_INFINITY, |acc, x| acc.max(*x));
    let tensor = (tensor - &max.insert_axis(Axis(1))).mapv(f32::exp);
    let sum = tensor.sum_axis(Axis(1)).insert_axis(Axis(1));

    tensor / &sum
}

/// Convert an RGB image into a `[3, height, width]` tensor with values in `[0, 1]`.
pub fn to_tensor(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Subtract the mean and divide by the standard deviation individually for each color channel.
pub fn normalize(tensor: Array4<f32>, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let as_channels = |values: [f32; 3]| {
        arr1(&values)
            .insert_axis(Axis(1))
            .insert_axis(Axis(2))
            .insert_axis(Axis(0))
    };

    (tensor - &as_channels(mean)) / &as_channels(std)
}

/// Resize so that the shorter side is `size`, maintaining the aspect ratio.
///
/// The longer side is truncated, not rounded.
pub fn resize_shorter_side(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = if width <= height {
        (size, (size as u64 * height as u64 / width as u64) as u32)
    } else {
        ((size as u64 * width as u64 / height as u64) as u32, size)
    };
    imageops::resize(image, new_width, new_height, FilterType::Triangle)
}

/// Crop an image from its center.
///
/// Images smaller than the crop are padded with black first.
pub fn center_crop(image: &RgbImage, crop_w: u32, crop_h: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width < crop_w || height < crop_h {
        let mut canvas = RgbImage::new(u32::max(width, crop_w), u32::max(height, crop_h));
        let left = crop_w.saturating_sub(width) / 2;
        let top = crop_h.saturating_sub(height) / 2;
        imageops::overlay(&mut canvas, image, left as i64, top as i64);
        return center_crop(&canvas, crop_w, crop_h);
    }

    let start_x = half_round_even(width - crop_w);
    let start_y = half_round_even(height - crop_h);
    imageops::crop_imm(image, start_x, start_y, crop_w, crop_h).to_image()
}

/// `round(value / 2)` with ties going to the even neighbour.
fn half_round_even(value: u32) -> u32 {
    let half = value / 2;
    if value % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

/// Resize, crop and convert a single image, without normalization.
fn single_classification_preprocessing(
    image: &DynamicImage,
    transform: &ClassifierTransform,
) -> Result<Array3<f32>, ServiceError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ServiceError::EmptyImage {
            width: width as usize,
            height: height as usize,
        });
    }

    let image = image.to_rgb8();
    let image = resize_shorter_side(&image, transform.resize_size);
    let image = center_crop(&image, transform.crop_size, transform.crop_size);
    Ok(to_tensor(&image))
}

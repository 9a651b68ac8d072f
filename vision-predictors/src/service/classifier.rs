use std::{path::Path, time::Instant};

use image::DynamicImage;
use log::{debug, info};
use rayon::ThreadPool;

use crate::{
    manifest::{PredictorManifest, CONVNEXT, SWIN_V2_TINY},
    providers::{DefaultProvider, Provider},
};

use super::{
    labels::IMAGENET_LABELS,
    prepare::{
        batch_classification_preprocessing, classification_preprocessing, ClassifierTransform,
    },
    utility::read_and_prepare_images,
    Config, InferenceOutput, Prediction, ServiceError,
};

/// The ImageNet classifiers shipped with this crate.
///
/// They share the normalization and the 224x224 input, and differ in how much the
/// image is resized before the center crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifierPreset {
    /// ConvNeXt (base), resized to 232 before cropping.
    ConvNext,
    /// Swin Transformer V2 (tiny), resized to 256 before cropping.
    SwinV2Tiny,
}

impl ClassifierPreset {
    pub fn transform(&self) -> ClassifierTransform {
        match self {
            ClassifierPreset::ConvNext => ClassifierTransform {
                resize_size: 232,
                crop_size: 224,
            },
            ClassifierPreset::SwinV2Tiny => ClassifierTransform {
                resize_size: 256,
                crop_size: 224,
            },
        }
    }

    pub fn manifest(&self) -> PredictorManifest {
        match self {
            ClassifierPreset::ConvNext => CONVNEXT,
            ClassifierPreset::SwinV2Tiny => SWIN_V2_TINY,
        }
    }
}

/// Classifies images into the ImageNet-1k categories.
pub struct ImageClassifier<P: Provider = DefaultProvider> {
    provider: P,
    transform: ClassifierTransform,
    manifest: PredictorManifest,
    labels: &'static [&'static str],
    thread_pool: ThreadPool,
}

impl<P: Provider> ImageClassifier<P> {
    pub fn with_provider(
        provider: P,
        preset: ClassifierPreset,
        config: Config,
    ) -> Result<Self, ServiceError> {
        info!(
            "Creating {} classifier on provider {}",
            preset.manifest().tag,
            provider.name()
        );
        Ok(Self {
            provider,
            transform: preset.transform(),
            manifest: preset.manifest(),
            labels: &IMAGENET_LABELS,
            thread_pool: config.thread_pool()?,
        })
    }

    /// Replaces the ImageNet label table, for models with a different classification head.
    pub fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    pub fn manifest(&self) -> &PredictorManifest {
        &self.manifest
    }

    pub fn transform(&self) -> &ClassifierTransform {
        &self.transform
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Classifies one image, returning the best guess and its softmax score.
    pub fn classify_image(&self, image: &DynamicImage) -> Result<Prediction, ServiceError> {
        let input = classification_preprocessing(image, &self.transform)?;
        let output = self.run(input)?;
        output
            .best_predictions()
            .into_iter()
            .next()
            .ok_or(ServiceError::InvalidOutputShape {
                expected: 1,
                actual: 0,
            })
    }

    /// Classifies a batch of images in a single forward pass.
    pub fn classify_images(&self, images: &[DynamicImage]) -> Result<InferenceOutput, ServiceError> {
        let input =
            batch_classification_preprocessing(images, &self.transform, &self.thread_pool)?;
        self.run(input)
    }

    /// Reads, preprocesses and classifies the images at the given paths.
    pub fn classify_paths<T>(&self, paths: &[T]) -> Result<InferenceOutput, ServiceError>
    where
        T: AsRef<Path>,
    {
        let input = read_and_prepare_images(paths, &self.transform, &self.thread_pool)?;
        self.run(input)
    }

    fn run(&self, input: ndarray::Array4<f32>) -> Result<InferenceOutput, ServiceError> {
        let now = Instant::now();
        let logits = self.provider.run(input.into_dyn())?;
        debug!("Classification forward pass took {:.2?}", now.elapsed());
        InferenceOutput::new(logits, self.labels)
    }
}

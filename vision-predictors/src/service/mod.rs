//! Contains the predictors that run the vision models.
//!
//! Predictors are created using a [`ServiceBuilder`], which can be created using [`ServiceBuilder::new`].
//! The builder loads the model once and hands it to either a [`DepthEstimator`] or an [`ImageClassifier`].
//!
//! Both predictors can also be created from any [`Provider`] with their `with_provider` constructors,
//! if you want to bring your own execution provider.

mod classifier;
mod depth;
pub mod labels;
pub mod prepare;
pub mod resize;
pub mod utility;

pub use classifier::{ClassifierPreset, ImageClassifier};
pub use depth::DepthEstimator;
pub use resize::StrideResize;

use ndarray::{Array2, ArrayD, Ix2, ShapeError};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{error::Error, path::PathBuf};
use thiserror::Error;

use crate::providers::{DefaultProvider, ProviderError};

use self::prepare::postprocessing;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("The input is invalid: {0}")]
    InvalidInput(Box<dyn Error + Send + Sync>),
    #[error("The image is empty ({width}x{height})")]
    EmptyImage { width: usize, height: usize },
    #[error("The configuration is invalid: {0}")]
    InvalidConfig(&'static str),
    #[error("The thread pool could not be created: {0}")]
    CouldNotCreateThreadPool(#[from] ThreadPoolBuildError),
    #[error("The model failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("The output shape {actual} is different than expected {expected}")]
    InvalidOutputShape { expected: usize, actual: usize },
    #[error("The depth output shape {0:?} is not a single depth map")]
    UnsupportedDepthShape(Vec<usize>),
    #[error("The model predicts {classes} classes but {labels} labels are available")]
    LabelMismatch { classes: usize, labels: usize },
    #[error("A tensor could not be reshaped: {0}")]
    InvalidShape(#[from] ShapeError),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { num_threads: 1 }
    }
}

impl Config {
    pub(crate) fn thread_pool(&self) -> Result<ThreadPool, ServiceError> {
        if self.num_threads == 0 {
            return Err(ServiceError::InvalidConfig("num_threads must be greater than 0"));
        }
        Ok(ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()?)
    }
}

#[derive(Clone, Debug)]
pub struct ServiceBuilder {
    model_path: PathBuf,
    config: Config,
    stride_resize: StrideResize,
}

impl ServiceBuilder {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            config: Config::default(),
            stride_resize: StrideResize::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Input resize policy of the depth estimator, ignored by classifiers.
    pub fn stride_resize(mut self, stride_resize: StrideResize) -> Self {
        self.stride_resize = stride_resize;
        self
    }

    pub fn build_depth_estimator(self) -> Result<DepthEstimator, ServiceError> {
        let provider = DefaultProvider::from_path(&self.model_path)?;
        DepthEstimator::with_provider(provider, self.stride_resize, self.config)
    }

    pub fn build_classifier(
        self,
        preset: ClassifierPreset,
    ) -> Result<ImageClassifier, ServiceError> {
        let provider = DefaultProvider::from_path(&self.model_path)?;
        ImageClassifier::with_provider(provider, preset, self.config)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class: String,
    pub probability: f32,
}

/// Softmax scores of a batch of classified images.
pub struct InferenceOutput {
    batch_predictions: Array2<f32>,
    labels: &'static [&'static str],
}

impl InferenceOutput {
    /// Wraps the raw logits of a classifier, shaped `[batch, classes]`.
    pub fn new(
        output_tensor: ArrayD<f32>,
        labels: &'static [&'static str],
    ) -> Result<Self, ServiceError> {
        if output_tensor.ndim() != 2 {
            return Err(ServiceError::InvalidOutputShape {
                expected: 2,
                actual: output_tensor.ndim(),
            });
        }

        let output_tensor = output_tensor.into_dimensionality::<Ix2>()?;
        let classes = output_tensor.ncols();
        if classes != labels.len() {
            return Err(ServiceError::LabelMismatch {
                classes,
                labels: labels.len(),
            });
        }

        let batch_predictions = postprocessing(output_tensor);
        Ok(Self {
            batch_predictions,
            labels,
        })
    }

    /// Softmax probabilities, one row per batch element.
    pub fn probabilities(&self) -> &Array2<f32> {
        &self.batch_predictions
    }

    /// The most probable class of each batch element.
    ///
    /// There is no confidence threshold: a best guess is always returned.
    /// When several classes share the highest probability, the lowest index wins.
    pub fn best_predictions(&self) -> Vec<Prediction> {
        self.batch_predictions
            .outer_iter()
            .map(|row| {
                let (index, probability) = row.iter().enumerate().fold(
                    (0, f32::NEG_INFINITY),
                    |(best_index, best), (i, &x)| {
                        if x > best {
                            (i, x)
                        } else {
                            (best_index, best)
                        }
                    },
                );
                self.prediction(index, probability)
            })
            .collect()
    }

    pub fn get_top_k_predictions(&self, k: usize) -> Vec<Vec<Prediction>> {
        // for each row in the tensor, get the top k predictions
        self.batch_predictions
            .outer_iter()
            .map(|row| {
                let mut top_k_classes = row.iter().copied().enumerate().collect::<Vec<_>>();
                // stable sort, so ties keep the lowest index first
                top_k_classes.sort_by(|a, b| b.1.total_cmp(&a.1));
                top_k_classes.truncate(k);

                top_k_classes
                    .into_iter()
                    .map(|(i, x)| self.prediction(i, x))
                    .collect()
            })
            .collect()
    }

    pub fn get_top_k_class_names(&self, k: usize) -> Vec<Vec<String>> {
        self.get_top_k_predictions(k)
            .into_iter()
            .map(|batch_element_top_classes| {
                batch_element_top_classes
                    .into_iter()
                    .map(|prediction| prediction.class)
                    .collect()
            })
            .collect()
    }

    fn prediction(&self, index: usize, probability: f32) -> Prediction {
        Prediction {
            class: String::from(self.labels[index]),
            probability,
        }
    }
}

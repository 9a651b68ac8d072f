mod tract;

pub use tract::*;

use std::error::Error;

use ndarray::ArrayD;
use thiserror::Error;

pub type DefaultProvider = TractProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("The model could not be loaded: {0}")]
    CouldNotLoad(Box<dyn Error + Send + Sync>),
    #[error("The model could not be run on an input of shape {shape:?}: {source}")]
    CouldNotRun {
        shape: Vec<usize>,
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("The model did not produce any output")]
    MissingOutput,
}

/// A trait that has to be implemented by all the execution providers.
///
/// A provider owns an already loaded model and runs its forward pass on a single
/// floating point input tensor, returning the first output of the model.
/// Preprocessing and postprocessing are left to the predictors in [`crate::service`].
pub trait Provider {
    /// Returns the name of the execution provider.
    fn name(&self) -> &str;

    /// Runs the model forward pass.
    fn run(&self, input: ArrayD<f32>) -> Result<ArrayD<f32>, ProviderError>;
}

impl<P> Provider for &P
where
    P: Provider + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, input: ArrayD<f32>) -> Result<ArrayD<f32>, ProviderError> {
        (**self).run(input)
    }
}

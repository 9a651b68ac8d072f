//! # Vision predictors
//!
//! Depth estimation and image classification on top of pretrained ONNX vision models.
//!
//! Each predictor follows the same linear pipeline: preprocess an image into a normalized tensor,
//! run it through a [`providers::Provider`], and postprocess the raw output into something a user
//! can read (a label with its score, or a depth map at the original image resolution).
//!
//! Predictors are created through a [`service::ServiceBuilder`], which loads the model once and
//! keeps it for every later call.
pub mod colormap;
pub mod interpolate;
pub mod manifest;
pub mod providers;
pub mod service;

use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use strum::Display;
use vision_predictors::service::ClassifierPreset;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate the depth of an image and save it as an inferno heatmap.
    Depth(DepthArgs),
    /// Classify images into the ImageNet-1k categories.
    Classify(ClassifyArgs),
    /// List the available predictors.
    List,
}

#[derive(clap::Args, Debug)]
pub struct DepthArgs {
    /// Input image path.
    /// Example: --input room.jpg
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path of the Depth Anything ONNX model.
    #[arg(short, long, default_value = "models/depth_anything_vitl14.onnx")]
    pub model: PathBuf,

    /// Path of the colorized depth map.
    #[arg(short, long, default_value = "depth.png")]
    pub output: PathBuf,

    /// Number of threads used for resizing. Must be greater than 0 and less than 65536.
    /// Example: --threads 8
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    /// Input image path.
    /// Example: --input /path/to/image1.jpg --input /path/to/image2.jpg
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,

    /// Classifier name.
    /// Supported classifiers: convnext, swin-v2-tiny
    /// Default: convnext
    #[arg(short = 'c', long, default_value = "convnext")]
    pub classifier: Classifier,

    /// Path of the ONNX model.
    /// Default: models/<classifier>.onnx
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Number of threads used for preprocessing. Must be greater than 0 and less than 65536.
    /// Example: --threads 8
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Number of top infered class probabilities to show. Must be greater than 0 and less or equal than 1000.
    /// With the default of 1 each image is classified on its own and only the best guess is printed.
    /// Example: --show 10
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub show: u16,
}

impl ClassifyArgs {
    pub fn model_path(&self) -> PathBuf {
        self.model
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("models/{}.onnx", self.classifier)))
    }
}

#[derive(Debug, Clone, Copy, Display)]
pub enum Classifier {
    #[strum(serialize = "convnext")]
    ConvNext,
    #[strum(serialize = "swin-v2-tiny")]
    SwinV2Tiny,
}

impl FromStr for Classifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "convnext" => Ok(Self::ConvNext),
            "swin-v2-tiny" | "swin" => Ok(Self::SwinV2Tiny),
            _ if s.starts_with('c') => Ok(Self::ConvNext),
            _ if s.starts_with('s') => Ok(Self::SwinV2Tiny),
            _ => Err(format!("Invalid classifier name: {}", s)),
        }
    }
}

impl From<Classifier> for ClassifierPreset {
    fn from(value: Classifier) -> Self {
        match value {
            Classifier::ConvNext => ClassifierPreset::ConvNext,
            Classifier::SwinV2Tiny => ClassifierPreset::SwinV2Tiny,
        }
    }
}

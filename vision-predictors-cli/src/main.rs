use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::info;
use vision_predictors::{
    colormap::visualize_depth,
    manifest::catalog,
    providers::Provider,
    service::{
        utility::{read_image, read_images},
        Config, ImageClassifier, Prediction, ServiceBuilder, ServiceError,
    },
};

mod cli;
use cli::{Args, ClassifyArgs, Command, DepthArgs};
use thiserror::Error;

#[derive(Debug, Error)]
enum AppError {
    #[error("Invalid model path {0:?} -> {1}")]
    InvalidModelPath(PathBuf, ServiceError),
    #[error("Could not decode image -> {0}")]
    CouldNotDecodeImage(Box<dyn Error + Send + Sync>),
    #[error("Could not save the depth map -> {0}")]
    CouldNotSaveImage(image::ImageError),
    #[error("Runtime failure -> {0}")]
    RuntimeFailure(ServiceError),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidInput(e) => AppError::CouldNotDecodeImage(e),
            e => AppError::RuntimeFailure(e),
        }
    }
}

fn main() {
    if let Err(e) = exec_program() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn exec_program() -> Result<(), AppError> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Depth(args) => estimate_depth(args),
        Command::Classify(args) => classify_images(args),
        Command::List => {
            for manifest in catalog() {
                println!("{manifest}");
            }
            Ok(())
        }
    }
}

fn estimate_depth(args: DepthArgs) -> Result<(), AppError> {
    info!("Input image path: {:?}", args.input);
    info!("Model path: {:?}", args.model);

    let config = Config {
        num_threads: args.threads.into(),
    };
    let estimator = ServiceBuilder::new(args.model.clone())
        .config(config)
        .build_depth_estimator()
        .map_err(|e| AppError::InvalidModelPath(args.model, e))?;

    info!("Depth estimator created successfully");

    let image = read_image(&args.input)?;
    let depth = estimator.estimate_depth(&image)?;

    let (min, max) = depth
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), d| {
            (min.min(*d), max.max(*d))
        });
    info!("Depth range: {} to {}", min, max);

    visualize_depth(&depth)
        .save(&args.output)
        .map_err(AppError::CouldNotSaveImage)?;

    println!(
        "Depth map ({}x{}) saved to {}",
        depth.ncols(),
        depth.nrows(),
        args.output.display()
    );
    Ok(())
}

fn classify_images(args: ClassifyArgs) -> Result<(), AppError> {
    let model_path = args.model_path();
    let ranking_len = args.show.into();

    info!("Input image path: {:?}", args.input);
    info!("Classifier: {}", args.classifier);
    info!("Model path: {:?}", model_path);
    info!(
        "Number of top infered class probabilities to show: {}",
        ranking_len
    );

    let config = Config {
        num_threads: args.threads.into(),
    };
    let classifier = ServiceBuilder::new(model_path.clone())
        .config(config)
        .build_classifier(args.classifier.into())
        .map_err(|e| AppError::InvalidModelPath(model_path, e))?;

    info!("Classifier {} created successfully", classifier.manifest().tag);

    for line in describe_predictions(&classifier, &args.input, ranking_len)? {
        println!("{line}");
    }

    Ok(())
}

/// Best guess per image, plus the top `k` ranking of a single batched pass when `k > 1`.
fn describe_predictions<P: Provider>(
    classifier: &ImageClassifier<P>,
    inputs: &[PathBuf],
    k: usize,
) -> Result<Vec<String>, ServiceError> {
    let images = read_images(inputs)?;
    let mut lines = Vec::new();

    if k <= 1 {
        for (path, image) in inputs.iter().zip(&images) {
            let best = classifier.classify_image(image)?;
            lines.push(format!(
                "{}: {} ({:.2} %)",
                path.display(),
                best.class,
                best.probability * 100_f32
            ));
        }
        return Ok(lines);
    }

    let output = classifier.classify_images(&images)?;
    lines.push(format!("Top {} predictions:", k));
    let best_predictions = output.best_predictions();
    let rankings = output.get_top_k_predictions(k);
    for ((path, best), ranking) in inputs.iter().zip(best_predictions).zip(rankings) {
        lines.push(format!(
            "  {}: {} ({:.2} %)",
            path.display(),
            best.class,
            best.probability * 100_f32
        ));
        lines.extend(describe_ranking(&ranking));
    }
    Ok(lines)
}

fn describe_ranking(ranking: &[Prediction]) -> Vec<String> {
    ranking
        .iter()
        .enumerate()
        .map(|(rank, prediction)| {
            format!(
                "    {}. class: {}, probability: {} %",
                rank + 1,
                prediction.class,
                prediction.probability * 100_f32
            )
        })
        .collect()
}

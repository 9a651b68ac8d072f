//! Class names of the ImageNet-1k dataset, index-aligned with the classification heads
//! of the torchvision classifiers.

pub static IMAGENET_LABELS: [&str; 1000] = include!("labels/imagenet_labels.in");

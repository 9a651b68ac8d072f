//! Packaging metadata for the predictors.
//!
//! A manifest describes how a predictor is published (tag, description, access level).
//! It is plain data living beside the predictor, never part of the inference call itself.

use std::fmt::Display;

/// Who can see a published predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Unlisted,
    Private,
}

impl Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let access = match self {
            Access::Public => "public",
            Access::Unlisted => "unlisted",
            Access::Private => "private",
        };
        write!(f, "{access}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorManifest {
    pub tag: &'static str,
    pub description: &'static str,
    pub access: Access,
}

pub const DEPTH_ANYTHING: PredictorManifest = PredictorManifest {
    tag: "@tiktok/depth-anything",
    description: "Depth estimation using Depth Anything model.",
    access: Access::Unlisted,
};

pub const CONVNEXT: PredictorManifest = PredictorManifest {
    tag: "@pytorch/convnext",
    description: "Image classification entirely using standard ConvNet modules.",
    access: Access::Public,
};

pub const SWIN_V2_TINY: PredictorManifest = PredictorManifest {
    tag: "@pytorch/swin-v2-tiny",
    description: "Classify an image with Swin Transformer V2 (tiny).",
    access: Access::Public,
};

/// Every predictor shipped by this crate.
pub fn catalog() -> [PredictorManifest; 3] {
    [DEPTH_ANYTHING, CONVNEXT, SWIN_V2_TINY]
}

impl Display for PredictorManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.tag, self.access, self.description)
    }
}

//! Error Handling Module
//!
//! Defines the error taxonomy for the detection core.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only startup paths (classifier construction, configuration loading) return
//! these to callers. A single `detect()` call converts every one of them into
//! the failure sentinel instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for crop disease detection
#[derive(Error, Debug)]
pub enum CropError {
    /// The input bytes could not be decoded as a raster image
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The image decoded but its color mode cannot be converted to RGB
    #[error("Unsupported image mode: {0}")]
    UnsupportedMode(String),

    /// The classifier artifact is missing or unreadable
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// A class index outside the label catalog
    #[error("Class index {index} out of range (catalog has {len} labels)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The classifier failed or produced an unusable score vector
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CropError {
    /// Short stable name of the variant, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            CropError::ImageDecode(_) => "image_decode",
            CropError::UnsupportedMode(_) => "unsupported_mode",
            CropError::ModelLoad { .. } => "model_load",
            CropError::IndexOutOfRange { .. } => "index_out_of_range",
            CropError::Inference(_) => "inference",
            CropError::Config(_) => "config",
        }
    }
}

impl From<image::ImageError> for CropError {
    fn from(err: image::ImageError) -> Self {
        CropError::ImageDecode(err.to_string())
    }
}

impl From<toml::de::Error> for CropError {
    fn from(err: toml::de::Error) -> Self {
        CropError::Config(err.to_string())
    }
}

/// Convenience Result type for detection operations
pub type Result<T> = std::result::Result<T, CropError>;

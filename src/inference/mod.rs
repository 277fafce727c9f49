//! Inference module: the detection pipeline
//!
//! - [`normalizer`]: raw bytes -> `[1, 128, 128, 3]` tensor
//! - [`classifier`]: tensor -> class scores (trained model or stand-in)
//! - [`detector`]: the end-to-end service handed to request handlers

pub mod classifier;
pub mod detector;
pub mod normalizer;

pub use classifier::{
    build_classifier, BurnClassifier, Classifier, ClassifierHandle, ClassifierMode,
    ClassifierStatus, StandInClassifier,
};
pub use detector::{argmax, DetectionService, PredictionResult};
pub use normalizer::{ImageNormalizer, ImageTensor, INPUT_SIZE};

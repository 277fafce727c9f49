//! Model module for the burn CNN the classifier artifact is recorded from
//!
//! ## Architecture
//!
//! A small convolutional network:
//! - 39-class crop disease classification
//! - 128x128 RGB input
//! - Loaded once at startup from a `CompactRecorder` (`.mpk`) record

pub mod cnn;

pub use cnn::{CropClassifier, CropClassifierConfig};

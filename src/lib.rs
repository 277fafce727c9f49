//! # Crop Disease Detection
//!
//! Detection core for a crop disease backend: turns an uploaded leaf photo
//! into a crop/disease label from the 39-class PlantVillage catalog and a
//! treatment recommendation.
//!
//! ## Modules
//!
//! - `catalog`: class index -> `(crop, disease)` labels
//! - `treatment`: treatment table and resolver
//! - `inference`: image normalization, classifier adapter, detection service
//! - `model`: the burn CNN the classifier artifact is recorded from
//! - `backend`: compile-time burn backend selection
//! - `config`: detector configuration (TOML)
//! - `utils`: logging and error handling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crop_disease::{build_classifier, DetectionService, DetectorConfig};
//!
//! let config = DetectorConfig::from_toml_file("detector.toml".as_ref())?;
//! let service = DetectionService::with_builtin_tables(build_classifier(&config.classifier)?)?;
//!
//! let result = service.detect(&std::fs::read("leaf.jpg")?);
//! println!("{} / {}: {}", result.crop, result.disease, result.treatment);
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod inference;
pub mod model;
pub mod treatment;
pub mod utils;

pub use catalog::{ClassLabel, LabelCatalog, NUM_CLASSES};
pub use config::{ClassifierConfig, DetectorConfig};
pub use inference::{
    build_classifier, Classifier, ClassifierHandle, ClassifierMode, ClassifierStatus,
    DetectionService, ImageNormalizer, ImageTensor, PredictionResult,
};
pub use treatment::{TreatmentResolver, TreatmentTable};
pub use utils::error::{CropError, Result};

//! Detector configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [classifier]
//! mode = "model"                 # or "stand_in"
//! model_path = "models/crop_disease_model.mpk"
//! fallback_to_stand_in = true
//! # stand_in_seed = 42
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::inference::classifier::ClassifierMode;
use crate::utils::error::{CropError, Result};

/// Default location of the model record
pub const DEFAULT_MODEL_PATH: &str = "models/crop_disease_model.mpk";

/// Classifier selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub mode: ClassifierMode,

    /// Model record, resolved with the `.mpk` extension
    pub model_path: PathBuf,

    /// Use the stand-in when the model fails to load instead of failing startup
    pub fallback_to_stand_in: bool,

    /// Makes stand-in output reproducible per input
    pub stand_in_seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Model,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            fallback_to_stand_in: true,
            stand_in_seed: None,
        }
    }
}

/// Top-level detection core configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub classifier: ClassifierConfig,
}

impl DetectorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CropError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.classifier.mode, ClassifierMode::Model);
        assert_eq!(config.classifier.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert!(config.classifier.fallback_to_stand_in);
        assert_eq!(config.classifier.stand_in_seed, None);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DetectorConfig::from_toml_str("").unwrap(), DetectorConfig::default());
    }

    #[test]
    fn test_parse_stand_in() {
        let config = DetectorConfig::from_toml_str(
            r#"
            [classifier]
            mode = "stand_in"
            stand_in_seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.mode, ClassifierMode::StandIn);
        assert_eq!(config.classifier.stand_in_seed, Some(42));
        assert!(config.classifier.fallback_to_stand_in);
    }

    #[test]
    fn test_parse_model_without_fallback() {
        let config = DetectorConfig::from_toml_str(
            r#"
            [classifier]
            model_path = "/srv/models/crop.mpk"
            fallback_to_stand_in = false
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.model_path, PathBuf::from("/srv/models/crop.mpk"));
        assert!(!config.classifier.fallback_to_stand_in);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let result = DetectorConfig::from_toml_str("[classifier]\nmode = \"ensemble\"\n");
        assert!(matches!(result, Err(CropError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.toml");
        fs::write(&path, "[classifier]\nmode = \"stand_in\"\n").unwrap();

        let config = DetectorConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.classifier.mode, ClassifierMode::StandIn);

        assert!(matches!(
            DetectorConfig::from_toml_file(&dir.path().join("missing.toml")),
            Err(CropError::Config(_))
        ));
    }
}

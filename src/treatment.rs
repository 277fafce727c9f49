//! Treatment recommendations
//!
//! Resolves a decoded label to a human-readable recommendation. Lookup order:
//! 1. healthy labels get a crop-templated care message
//! 2. exact `(crop, disease)` match in the table
//! 3. the crop's `default` entry
//! 4. a generic message naming crop and disease
//!
//! The table is static configuration data compiled into the binary from
//! `data/treatments.toml`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{CropError, Result};

/// Embedded treatment table
const BUILTIN_TABLE: &str = include_str!("../data/treatments.toml");

/// Advice entries for one crop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropTreatments {
    /// Used when the disease has no entry of its own
    pub default: String,
    /// Disease key -> advice
    #[serde(default)]
    pub diseases: HashMap<String, String>,
}

/// Crop -> disease -> advice mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentTable {
    pub crops: HashMap<String, CropTreatments>,
}

/// Why a table lookup missed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreatmentMiss {
    UnknownCrop,
    UnknownDisease,
}

impl TreatmentTable {
    /// The table shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TABLE)
    }

    /// Parse a table from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: TreatmentTable = toml::from_str(text)?;
        if let Some((crop, _)) = table
            .crops
            .iter()
            .find(|(_, entry)| entry.default.trim().is_empty())
        {
            return Err(CropError::Config(format!(
                "treatment table entry '{}' has an empty default",
                crop
            )));
        }
        Ok(table)
    }

    /// Crop entry by exact, case-sensitive name
    pub fn crop(&self, crop: &str) -> Option<&CropTreatments> {
        self.crops.get(crop)
    }

    fn lookup(&self, crop: &str, disease: &str) -> std::result::Result<&str, TreatmentMiss> {
        let entry = self.crops.get(crop).ok_or(TreatmentMiss::UnknownCrop)?;
        entry
            .diseases
            .get(disease)
            .map(String::as_str)
            .ok_or(TreatmentMiss::UnknownDisease)
    }
}

/// Maps `(crop, disease, is_healthy)` to a recommendation.
///
/// Pure and infallible: every miss resolves to a fallback message.
#[derive(Debug, Clone)]
pub struct TreatmentResolver {
    table: TreatmentTable,
}

impl TreatmentResolver {
    pub fn new(table: TreatmentTable) -> Self {
        Self { table }
    }

    /// Resolver over the embedded table
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(TreatmentTable::builtin()?))
    }

    pub fn table(&self) -> &TreatmentTable {
        &self.table
    }

    /// Resolve a recommendation for a decoded label
    pub fn resolve(&self, crop: &str, disease: &str, is_healthy: bool) -> String {
        if is_healthy {
            return healthy_message(crop);
        }

        match self.table.lookup(crop, disease) {
            Ok(advice) => advice.to_string(),
            Err(TreatmentMiss::UnknownDisease) => {
                debug!(crop, disease, "no disease entry, using crop default");
                // lookup only reports UnknownDisease once the crop exists
                self.table
                    .crop(crop)
                    .map(|entry| entry.default.clone())
                    .unwrap_or_else(|| fallback_message(crop, disease))
            }
            Err(TreatmentMiss::UnknownCrop) => {
                debug!(crop, disease, "crop not in treatment table, using generic advice");
                fallback_message(crop, disease)
            }
        }
    }
}

/// Care message for healthy plants
pub fn healthy_message(crop: &str) -> String {
    format!(
        "Your {} plant appears to be healthy! Continue with regular care and monitoring.",
        crop
    )
}

/// Generic advice for crops missing from the table
pub fn fallback_message(crop: &str, disease: &str) -> String {
    format!(
        "Apply appropriate fungicides for {} {}. Consult with a local agricultural expert.",
        crop, disease
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LabelCatalog;

    fn resolver() -> TreatmentResolver {
        TreatmentResolver::builtin().unwrap()
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = TreatmentTable::builtin().unwrap();
        assert_eq!(table.crops.len(), 9);
        assert!(table.crop("Tomato").is_some());
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            resolver().resolve("Tomato", "Late_blight", false),
            "Apply fungicides immediately. Remove infected plants and avoid overhead irrigation."
        );
    }

    #[test]
    fn test_crop_default_on_unknown_disease() {
        assert_eq!(
            resolver().resolve("Apple", "Fire_blight", false),
            "Apply appropriate fungicides and maintain good orchard hygiene."
        );
    }

    #[test]
    fn test_unknown_crop_fallback() {
        let advice = resolver().resolve("Unknown", "X", false);
        assert!(advice.contains("Unknown"));
        assert!(advice.contains("X"));
        assert!(advice.contains("local agricultural expert"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let advice = resolver().resolve("tomato", "Late_blight", false);
        assert_eq!(advice, fallback_message("tomato", "Late_blight"));
    }

    #[test]
    fn test_bell_pepper_uses_catalog_spelling() {
        assert_eq!(
            resolver().resolve("Pepper,_bell", "Bacterial_spot", false),
            "Apply copper-based bactericides. Remove infected plants and avoid overhead irrigation."
        );
    }

    #[test]
    fn test_healthy_ignores_disease() {
        let r = resolver();
        assert_eq!(
            r.resolve("Tomato", "Late_blight", true),
            "Your Tomato plant appears to be healthy! Continue with regular care and monitoring."
        );
        assert_eq!(r.resolve("Grape", "anything", true), healthy_message("Grape"));
    }

    #[test]
    fn test_healthy_path_disjoint_from_advice() {
        let r = resolver();
        let catalog = LabelCatalog::plant_village();

        let mut advice: Vec<String> = Vec::new();
        for entry in r.table().crops.values() {
            advice.push(entry.default.clone());
            advice.extend(entry.diseases.values().cloned());
        }
        for label in catalog.labels() {
            advice.push(r.resolve(&label.crop, &label.disease, false));
        }

        for crop in catalog.crops() {
            let healthy = r.resolve(crop, "Late_blight", true);
            assert!(!advice.contains(&healthy), "healthy message collides for {}", crop);
        }
    }

    #[test]
    fn test_every_listed_disease_is_reachable() {
        let r = resolver();
        let catalog = LabelCatalog::plant_village();

        for label in catalog.labels().iter().filter(|l| !l.is_healthy) {
            if let Some(entry) = r.table().crop(&label.crop) {
                assert!(
                    entry.diseases.contains_key(&label.disease),
                    "{} has no entry for {}",
                    label.crop,
                    label.disease
                );
            }
        }
    }

    #[test]
    fn test_table_requires_default() {
        let text = r#"
            [crops.Tomato]
            default = ""
        "#;
        assert!(matches!(
            TreatmentTable::from_toml_str(text),
            Err(CropError::Config(_))
        ));

        let missing = r#"
            [crops.Tomato.diseases]
            Late_blight = "x"
        "#;
        assert!(TreatmentTable::from_toml_str(missing).is_err());
    }
}

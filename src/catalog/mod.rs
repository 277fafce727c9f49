//! Label catalog for the PlantVillage classes
//!
//! Maps a classifier output index to a `(crop, disease)` pair. Class names
//! follow the `"<Crop>___<DiseaseOrHealthy>"` convention; the triple
//! underscore is the split point.
//!
//! Crop spellings here must match the keys of the treatment table
//! (`data/treatments.toml`), since treatment lookup is an exact match.

use serde::{Deserialize, Serialize};

use crate::utils::error::{CropError, Result};

/// Total number of classes the classifier emits scores for
pub const NUM_CLASSES: usize = 39;

/// Separator between the crop and disease components of a class name
pub const CLASS_SEPARATOR: &str = "___";

/// Crop name used when a class name carries no separator
pub const UNKNOWN_CROP: &str = "Unknown";

/// Class names in classifier output order (sorted PlantVillage directories)
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    "Blueberry___healthy",
    "Cherry___Powdery_mildew",
    "Cherry___healthy",
    "Corn___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn___Common_rust",
    "Corn___Northern_Leaf_Blight",
    "Corn___healthy",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Grape___healthy",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___Leaf_scorch",
    "Strawberry___healthy",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
    "Background_without_leaves",
];

/// A decoded class label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    /// Position in the classifier output vector
    pub index: usize,
    /// Crop component (e.g. "Tomato")
    pub crop: String,
    /// Disease component, or a "healthy" marker (e.g. "Late_blight")
    pub disease: String,
    /// Derived from the disease component, see [`is_healthy_disease`]
    pub is_healthy: bool,
}

impl ClassLabel {
    /// Build a label from its index and raw class name
    pub fn from_class_name(index: usize, name: &str) -> Self {
        let (crop, disease) = parse_class_name(name);
        Self {
            index,
            crop: crop.to_string(),
            disease: disease.to_string(),
            is_healthy: is_healthy_disease(disease),
        }
    }

    /// The raw class name this label was decoded from
    pub fn class_name(&self) -> String {
        // Names without a separator were stored whole in `disease`
        if self.crop == UNKNOWN_CROP && class_index(&self.disease).is_some() {
            return self.disease.clone();
        }
        format!("{}{}{}", self.crop, CLASS_SEPARATOR, self.disease)
    }
}

/// Split a class name into `(crop, disease)`.
///
/// Names without the separator decode to crop `"Unknown"` with the whole
/// name as the disease.
pub fn parse_class_name(name: &str) -> (&str, &str) {
    name.split_once(CLASS_SEPARATOR)
        .unwrap_or((UNKNOWN_CROP, name))
}

/// Healthy heuristic: case-insensitive substring match of "healthy".
///
/// This is a string convention on the class names, not a structured flag.
/// Callers go through [`ClassLabel::is_healthy`] so a per-class flag can
/// replace it later.
pub fn is_healthy_disease(disease: &str) -> bool {
    disease.to_lowercase().contains("healthy")
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

/// Immutable index -> label table, built once at startup
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    labels: Vec<ClassLabel>,
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self::plant_village()
    }
}

impl LabelCatalog {
    /// The 39-class PlantVillage catalog
    pub fn plant_village() -> Self {
        Self::from_class_names(CLASS_NAMES.iter().copied())
    }

    /// Build a catalog from class names in output order
    pub fn from_class_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let labels = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| ClassLabel::from_class_name(index, name))
            .collect();
        Self { labels }
    }

    /// Decode a class index into its label
    pub fn decode(&self, index: usize) -> Result<&ClassLabel> {
        self.labels.get(index).ok_or(CropError::IndexOutOfRange {
            index,
            len: self.labels.len(),
        })
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All labels in index order
    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Distinct crop names in first-seen order
    pub fn crops(&self) -> Vec<&str> {
        let mut crops: Vec<&str> = Vec::new();
        for label in &self.labels {
            if !crops.contains(&label.crop.as_str()) {
                crops.push(&label.crop);
            }
        }
        crops
    }
}

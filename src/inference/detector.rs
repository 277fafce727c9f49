//! Detection service
//!
//! Orchestrates one detection: normalize -> classify -> decode label ->
//! resolve treatment. [`DetectionService::detect`] never fails; every error
//! along the way collapses into [`PredictionResult::failure`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{LabelCatalog, UNKNOWN_CROP};
use crate::inference::classifier::{Classifier, ClassifierHandle, ClassifierStatus};
use crate::inference::normalizer::ImageNormalizer;
use crate::treatment::TreatmentResolver;
use crate::utils::error::{CropError, Result};

/// Disease reported by the failure sentinel
pub const FAILURE_DISEASE: &str = "Detection Failed";

/// Treatment reported by the failure sentinel
pub const FAILURE_TREATMENT: &str = "Please try uploading a clearer image.";

/// Class index reported by the failure sentinel
pub const FAILURE_CLASS_INDEX: i32 = -1;

/// Outcome of a single detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub crop: String,
    pub disease: String,
    /// Score of the winning class, in `[0, 1]`
    pub confidence: f32,
    pub is_healthy: bool,
    pub treatment: String,
    /// Catalog index, or `-1` for a failed detection
    pub class_index: i32,
}

impl PredictionResult {
    /// The uniform "detection failed" result
    pub fn failure() -> Self {
        Self {
            crop: UNKNOWN_CROP.to_string(),
            disease: FAILURE_DISEASE.to_string(),
            confidence: 0.0,
            is_healthy: false,
            treatment: FAILURE_TREATMENT.to_string(),
            class_index: FAILURE_CLASS_INDEX,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.class_index == FAILURE_CLASS_INDEX
    }
}

/// Index and value of the largest score.
///
/// NaN scores are skipped and ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Result<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.ok_or_else(|| CropError::Inference("no usable class scores".to_string()))
}

/// The detection pipeline, constructed once and shared across requests
#[derive(Clone)]
pub struct DetectionService {
    normalizer: ImageNormalizer,
    classifier: Arc<dyn Classifier>,
    catalog: Arc<LabelCatalog>,
    resolver: Arc<TreatmentResolver>,
    status: ClassifierStatus,
}

impl DetectionService {
    pub fn new(handle: ClassifierHandle, catalog: LabelCatalog, resolver: TreatmentResolver) -> Self {
        Self {
            normalizer: ImageNormalizer::new(),
            classifier: handle.classifier,
            catalog: Arc::new(catalog),
            resolver: Arc::new(resolver),
            status: handle.status,
        }
    }

    /// Service over the built-in catalog and treatment table
    pub fn with_builtin_tables(handle: ClassifierHandle) -> Result<Self> {
        Ok(Self::new(
            handle,
            LabelCatalog::plant_village(),
            TreatmentResolver::builtin()?,
        ))
    }

    /// Run a detection, returning the failure sentinel on any error
    pub fn detect(&self, raw: &[u8]) -> PredictionResult {
        match self.try_detect(raw) {
            Ok(result) => result,
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "Detection failed");
                PredictionResult::failure()
            }
        }
    }

    /// Run a detection, surfacing the error instead of the sentinel
    pub fn try_detect(&self, raw: &[u8]) -> Result<PredictionResult> {
        let start = Instant::now();

        let tensor = self.normalizer.normalize(raw)?;
        let scores = self.classifier.classify(&tensor)?;
        let (index, confidence) = argmax(&scores)?;
        let label = self.catalog.decode(index)?;
        let treatment = self
            .resolver
            .resolve(&label.crop, &label.disease, label.is_healthy);

        debug!(
            class = index,
            confidence,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Detection complete"
        );

        Ok(PredictionResult {
            crop: label.crop.clone(),
            disease: label.disease.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            is_healthy: label.is_healthy,
            treatment,
            class_index: i32::try_from(index).map_err(|_| CropError::IndexOutOfRange {
                index,
                len: self.catalog.len(),
            })?,
        })
    }

    pub fn classifier_status(&self) -> &ClassifierStatus {
        &self.status
    }

    /// True when predictions come from the stand-in classifier
    pub fn is_degraded(&self) -> bool {
        self.status.degraded
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }
}

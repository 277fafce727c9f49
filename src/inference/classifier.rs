//! Classifier adapter
//!
//! [`Classifier`] is the single seam between the detection pipeline and a
//! model: one normalized tensor in, one score per catalog class out.
//!
//! Two implementations:
//! - [`BurnClassifier`]: the trained CNN, loaded once from a `CompactRecorder` record
//! - [`StandInClassifier`]: random normalized scores, for running the service
//!   without an artifact. Always reported as degraded.
//!
//! [`build_classifier`] picks one from configuration and applies the
//! load-failure policy.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor, TensorData},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::backend::{backend_name, default_device, InferenceBackend};
use crate::catalog::NUM_CLASSES;
use crate::config::ClassifierConfig;
use crate::inference::normalizer::ImageTensor;
use crate::model::cnn::{CropClassifier, CropClassifierConfig};
use crate::utils::error::{CropError, Result};

/// File extension `CompactRecorder` reads and writes
pub const MODEL_EXTENSION: &str = "mpk";

/// Which kind of classifier is requested or running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// The trained model artifact
    #[default]
    Model,
    /// Random scores; test/degraded mode
    StandIn,
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierMode::Model => write!(f, "model"),
            ClassifierMode::StandIn => write!(f, "stand_in"),
        }
    }
}

/// Maps a normalized image to per-class scores.
///
/// Implementations are shared across request threads and must not mutate
/// shared state per call.
pub trait Classifier: Send + Sync {
    /// Scores for each catalog class, in catalog order
    fn classify(&self, tensor: &ImageTensor) -> Result<Vec<f32>>;

    /// What this classifier is
    fn mode(&self) -> ClassifierMode;
}

/// Trained CNN backed by burn
pub struct BurnClassifier<B: Backend> {
    // Burn modules are Send but not necessarily Sync. The lock is held only
    // to clone the module; forward passes run on the clone.
    model: Mutex<CropClassifier<B>>,
    device: B::Device,
}

impl<B: Backend> BurnClassifier<B> {
    /// Wrap an in-memory model
    pub fn from_model(model: CropClassifier<B>, device: B::Device) -> Self {
        Self {
            model: Mutex::new(model),
            device,
        }
    }

    /// Load the model record at `path` (resolved with the `.mpk` extension)
    pub fn load(path: &Path, device: &B::Device) -> Result<Self> {
        let artifact = artifact_path(path);
        if !artifact.is_file() {
            return Err(CropError::ModelLoad {
                path: artifact,
                reason: "file not found".to_string(),
            });
        }

        let recorder = CompactRecorder::new();
        let model = CropClassifierConfig::for_catalog()
            .init::<B>(device)
            .load_file(artifact.clone(), &recorder, device)
            .map_err(|e| CropError::ModelLoad {
                path: artifact.clone(),
                reason: format!("{:?}", e),
            })?;

        if model.num_classes() != NUM_CLASSES {
            return Err(CropError::ModelLoad {
                path: artifact,
                reason: format!(
                    "model has {} outputs, catalog has {}",
                    model.num_classes(),
                    NUM_CLASSES
                ),
            });
        }

        Ok(Self::from_model(model, device.clone()))
    }

    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        let model = self
            .model
            .lock()
            .map_err(|_| CropError::Inference("classifier lock poisoned".to_string()))?
            .clone();

        let input = Tensor::<B, 4>::from_data(
            TensorData::new(tensor.as_slice().to_vec(), ImageTensor::SHAPE),
            &self.device,
        )
        // NHWC -> NCHW
        .swap_dims(1, 3)
        .swap_dims(2, 3);

        let probs = model.forward_softmax(input);
        probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| CropError::Inference(format!("{:?}", e)))
    }
}

impl<B: Backend> Classifier for BurnClassifier<B> {
    fn classify(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        // Shape and backend errors inside burn surface as panics
        let scores = panic::catch_unwind(AssertUnwindSafe(|| self.forward(tensor)))
            .map_err(|payload| CropError::Inference(panic_message(payload.as_ref())))??;

        if scores.len() != NUM_CLASSES {
            return Err(CropError::Inference(format!(
                "classifier emitted {} scores, expected {}",
                scores.len(),
                NUM_CLASSES
            )));
        }
        Ok(scores)
    }

    fn mode(&self) -> ClassifierMode {
        ClassifierMode::Model
    }
}

/// Random classifier used when no trained model is available.
///
/// Output is a normalized random vector over the catalog classes. Unseeded,
/// every call draws fresh entropy. Seeded, the stream is derived from the seed
/// and a fingerprint of the input, so the same image gets the same scores.
#[derive(Debug, Clone)]
pub struct StandInClassifier {
    seed: Option<u64>,
    num_classes: usize,
}

impl StandInClassifier {
    pub fn new() -> Self {
        Self {
            seed: None,
            num_classes: NUM_CLASSES,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            num_classes: NUM_CLASSES,
        }
    }

    fn rng_for(&self, tensor: &ImageTensor) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ fingerprint(tensor.as_slice())),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

impl Default for StandInClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for StandInClassifier {
    fn classify(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        let mut rng = self.rng_for(tensor);
        let raw: Vec<f32> = (0..self.num_classes).map(|_| rng.gen::<f32>()).collect();
        let sum: f32 = raw.iter().sum();

        if sum <= f32::EPSILON {
            return Ok(vec![1.0 / self.num_classes as f32; self.num_classes]);
        }
        Ok(raw.into_iter().map(|v| v / sum).collect())
    }

    fn mode(&self) -> ClassifierMode {
        ClassifierMode::StandIn
    }
}

/// What was asked for versus what is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierStatus {
    pub requested: ClassifierMode,
    pub active: ClassifierMode,
    /// True whenever predictions come from the stand-in
    pub degraded: bool,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

impl ClassifierStatus {
    fn new(requested: ClassifierMode, active: ClassifierMode) -> Self {
        Self {
            requested,
            active,
            degraded: active == ClassifierMode::StandIn,
            backend: backend_name().to_string(),
            model_path: None,
            load_error: None,
        }
    }
}

/// A constructed classifier plus its status, built once at startup
#[derive(Clone)]
pub struct ClassifierHandle {
    pub classifier: Arc<dyn Classifier>,
    pub status: ClassifierStatus,
}

impl ClassifierHandle {
    /// Wrap an already constructed classifier (e.g. a test fake)
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        let mode = classifier.mode();
        Self {
            classifier,
            status: ClassifierStatus::new(mode, mode),
        }
    }

    fn stand_in(config: &ClassifierConfig) -> Arc<dyn Classifier> {
        match config.stand_in_seed {
            Some(seed) => Arc::new(StandInClassifier::seeded(seed)),
            None => Arc::new(StandInClassifier::new()),
        }
    }
}

/// Build the classifier selected by `config`.
///
/// A model load failure falls back to the stand-in when
/// `fallback_to_stand_in` is set, and is returned as an error otherwise.
pub fn build_classifier(config: &ClassifierConfig) -> Result<ClassifierHandle> {
    match config.mode {
        ClassifierMode::StandIn => {
            warn!("Stand-in classifier selected: predictions are random and not real inference");
            Ok(ClassifierHandle {
                classifier: ClassifierHandle::stand_in(config),
                status: ClassifierStatus::new(ClassifierMode::StandIn, ClassifierMode::StandIn),
            })
        }
        ClassifierMode::Model => {
            let device = default_device();
            match BurnClassifier::<InferenceBackend>::load(&config.model_path, &device) {
                Ok(classifier) => {
                    info!(
                        path = %config.model_path.display(),
                        backend = backend_name(),
                        "Classifier model loaded"
                    );
                    let mut status =
                        ClassifierStatus::new(ClassifierMode::Model, ClassifierMode::Model);
                    status.model_path = Some(config.model_path.clone());
                    Ok(ClassifierHandle {
                        classifier: Arc::new(classifier),
                        status,
                    })
                }
                Err(e) if config.fallback_to_stand_in => {
                    error!(
                        error = %e,
                        "Model load failed; running DEGRADED with the stand-in classifier"
                    );
                    let mut status =
                        ClassifierStatus::new(ClassifierMode::Model, ClassifierMode::StandIn);
                    status.model_path = Some(config.model_path.clone());
                    status.load_error = Some(e.to_string());
                    Ok(ClassifierHandle {
                        classifier: ClassifierHandle::stand_in(config),
                        status,
                    })
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Path the recorder will actually read for `path`
pub fn artifact_path(path: &Path) -> PathBuf {
    path.with_extension(MODEL_EXTENSION)
}

/// FNV-1a over the bit patterns of the tensor values
fn fingerprint(values: &[f32]) -> u64 {
    values.iter().fold(0xcbf2_9ce4_8422_2325, |hash, v| {
        (hash ^ u64::from(v.to_bits())).wrapping_mul(0x0100_0000_01b3)
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("classifier panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("classifier panicked: {}", msg)
    } else {
        "classifier panicked".to_string()
    }
}

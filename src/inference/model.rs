//! Model loading - ONNX classifiers run through ONNX Runtime.
//!
//! The model file is produced offline. It must take one `float[N, 4]` input
//! in `FEATURE_NAMES` order and emit an `int64[N]` class index, preferably
//! on an output named `label`.

use std::fmt::Display;
use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, Value};
use parking_lot::Mutex;
use thiserror::Error;

use super::{FeatureVector, FEATURE_COUNT};

/// Preferred name of the class-index output
pub const LABEL_OUTPUT: &str = "label";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model not found at path: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    Runtime(String),

    #[error("unsupported model signature: {0}")]
    Signature(String),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("feature {index} is out of range for the model ({value})")]
    OutOfRange { index: usize, value: f64 },

    #[error("model produced no label")]
    EmptyOutput,

    #[error("model produced label {0}, outside the known classes")]
    UnknownLabel(i64),

    #[error("model backend failure: {0}")]
    Backend(String),
}

fn runtime(err: impl Display) -> ModelLoadError {
    ModelLoadError::Runtime(err.to_string())
}

fn backend(err: impl Display) -> PredictionError {
    PredictionError::Backend(err.to_string())
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Anything that maps a feature vector to a class index.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<i32, PredictionError>;

    /// Backend name, e.g. `onnx`.
    fn kind(&self) -> &'static str;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

pub struct OnnxClassifier {
    // `Session::run` needs exclusive access
    session: Mutex<Session>,
    label_output: String,
    class_count: usize,
}

impl OnnxClassifier {
    /// Load an ONNX model from disk and check that it classifies a zero input.
    pub fn load(path: impl AsRef<Path>, class_count: usize) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.display().to_string()));
        }

        let session = Session::builder()
            .map_err(runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?
            .with_intra_threads(1)
            .map_err(runtime)?
            .commit_from_file(path)
            .map_err(runtime)?;

        for (i, input) in session.inputs.iter().enumerate() {
            tracing::debug!("  Input {}: {} ({:?})", i, input.name, input.input_type);
        }
        if session.inputs.len() != 1 {
            return Err(ModelLoadError::Signature(format!(
                "expected exactly one input, found {}",
                session.inputs.len()
            )));
        }

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name == LABEL_OUTPUT)
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelLoadError::Signature("model has no outputs".into()))?;

        let classifier = Self {
            session: Mutex::new(session),
            label_output,
            class_count,
        };

        // shape or dtype mismatches only show up when the graph runs
        classifier
            .predict(&[0.0; FEATURE_COUNT])
            .map_err(|e| ModelLoadError::Signature(e.to_string()))?;

        Ok(classifier)
    }

    fn input_tensor(features: &FeatureVector) -> Result<Tensor<f32>, PredictionError> {
        let mut row = Vec::with_capacity(FEATURE_COUNT);
        for (index, &value) in features.iter().enumerate() {
            let narrowed = value as f32;
            if !narrowed.is_finite() {
                return Err(PredictionError::OutOfRange { index, value });
            }
            row.push(narrowed);
        }

        let array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), row).map_err(backend)?;
        Value::from_array(array).map_err(backend)
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &FeatureVector) -> Result<i32, PredictionError> {
        let input = Self::input_tensor(features)?;

        let label = {
            let mut session = self.session.lock();
            let outputs = session.run(ort::inputs![input]).map_err(backend)?;
            let output = outputs
                .get(self.label_output.as_str())
                .ok_or(PredictionError::EmptyOutput)?;
            let (_, labels) = output.try_extract_tensor::<i64>().map_err(backend)?;
            *labels.first().ok_or(PredictionError::EmptyOutput)?
        };

        match usize::try_from(label) {
            Ok(index) if index < self.class_count => {
                i32::try_from(label).map_err(|_| PredictionError::UnknownLabel(label))
            }
            _ => Err(PredictionError::UnknownLabel(label)),
        }
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

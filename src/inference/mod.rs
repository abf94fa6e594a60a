//! Inference Module - validation, ONNX model and prediction service
//!
//! Validation turns raw request input into a `PredictionRequest`; the
//! service runs it through the classifier loaded at startup.

pub mod validate;
pub mod model;
pub mod service;

// Re-export common types
pub use validate::{parse_form, parse_json, FieldIssue, PredictionRequest, ValidationError};
pub use model::{ModelLoadError, PredictionError};
pub use service::{ModelInfo, PredictionService};

/// Number of measurements per request
pub const FEATURE_COUNT: usize = 4;

/// Request field names, in model column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

pub type FeatureVector = [f64; FEATURE_COUNT];

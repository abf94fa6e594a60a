//! Prediction Service - shared wrapper around the loaded model

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::model::{Classifier, ModelLoadError, OnnxClassifier, PredictionError};
use super::validate::PredictionRequest;

/// Loaded model metadata, served by `GET /api/v1/model`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub kind: &'static str,
    pub classes: Vec<i32>,
    pub labels: Vec<String>,
}

struct Inner {
    name: String,
    labels: Vec<String>,
    classifier: Box<dyn Classifier>,
}

/// Cheap to clone; every clone shares the same model.
#[derive(Clone)]
pub struct PredictionService {
    inner: Arc<Inner>,
}

impl PredictionService {
    /// Load the ONNX model from disk. Called once, before serving.
    /// `labels[i]` names class index `i`.
    pub fn load(path: impl AsRef<Path>, labels: Vec<String>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        tracing::info!("Loading ONNX model from: {}", path.display());

        let classifier = OnnxClassifier::load(path, labels.len())?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        let service = Self::with_classifier(name, labels, Box::new(classifier));
        tracing::info!(
            "Model '{}' loaded ({}, labels {:?})",
            service.inner.name,
            service.inner.classifier.kind(),
            service.inner.labels
        );
        Ok(service)
    }

    pub fn with_classifier(
        name: impl Into<String>,
        labels: Vec<String>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                labels,
                classifier,
            }),
        }
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<i32, PredictionError> {
        let started = Instant::now();
        let label = self.inner.classifier.predict(&request.features())?;
        tracing::debug!(label, elapsed_us = started.elapsed().as_micros() as u64, "prediction computed");
        Ok(label)
    }

    pub fn label_name(&self, label: i32) -> Option<&str> {
        usize::try_from(label)
            .ok()
            .and_then(|i| self.inner.labels.get(i))
            .map(String::as_str)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.inner.name.clone(),
            kind: self.inner.classifier.kind(),
            classes: (0..self.inner.labels.len() as i32).collect(),
            labels: self.inner.labels.clone(),
        }
    }
}

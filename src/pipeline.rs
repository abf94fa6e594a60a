//! Endpoint orchestration: validate, predict, persist.
//!
//! ```text
//! Validating ──► Predicting ──► Persisting ──► Responding
//!     │              │              │
//!     └── 422        └── 500        └── 500 (prediction discarded)
//! ```
//!
//! Each stage runs at most once and the first failure is terminal. Nothing is
//! retried.

use std::fmt;

use thiserror::Error;

use crate::error::AppError;
use crate::inference::{PredictionError, PredictionRequest, PredictionService, ValidationError};
use crate::models::PredictionRecord;
use crate::store::{AuditStore, PersistenceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Predicting,
    Persisting,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Predicting => "predicting",
            Stage::Persisting => "persisting",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("rejected input: {0}")]
    Validation(ValidationError),

    #[error("prediction failed: {0}")]
    Prediction(PredictionError),

    #[error("audit write failed, discarding prediction: {0}")]
    Persistence(PersistenceError),
}

impl PipelineError {
    /// Stage at which the request stopped.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) => Stage::Validating,
            PipelineError::Prediction(_) => Stage::Predicting,
            PipelineError::Persistence(_) => Stage::Persisting,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => AppError::Validation(e),
            PipelineError::Prediction(e) => AppError::Prediction(e),
            PipelineError::Persistence(e) => AppError::Persistence(e),
        }
    }
}

/// Log a terminal failure against the stage it happened in.
fn stopped(err: PipelineError, input: Option<&PredictionRequest>) -> PipelineError {
    match err {
        PipelineError::Validation(_) => tracing::debug!(stage = %err.stage(), "{}", err),
        _ => tracing::error!(stage = %err.stage(), input = ?input, "{}", err),
    }
    err
}

/// Run one request through the pipeline.
///
/// `parse` is the validation step for the request's body format. On success
/// the returned record is the committed audit row; its `prediction` is the
/// only label the caller may report.
pub async fn run<F>(
    predictor: &PredictionService,
    store: &dyn AuditStore,
    parse: F,
) -> Result<PredictionRecord, PipelineError>
where
    F: FnOnce() -> Result<PredictionRequest, ValidationError>,
{
    let request = parse().map_err(|e| stopped(PipelineError::Validation(e), None))?;

    let prediction = predictor
        .predict(&request)
        .map_err(|e| stopped(PipelineError::Prediction(e), Some(&request)))?;

    let record = store
        .record(&request, prediction)
        .await
        .map_err(|e| stopped(PipelineError::Persistence(e), Some(&request)))?;

    tracing::info!(stage = %Stage::Responding, id = record.id, prediction, "prediction recorded");
    Ok(record)
}

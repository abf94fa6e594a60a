//! Audit log handlers

use axum::{extract::{State, Path, Query}, Json};

use crate::{AppState, AppResult, AppError};
use crate::models::{PredictionFilter, PredictionRecord};

/// List recorded predictions, newest first
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<PredictionFilter>,
) -> AppResult<Json<Vec<PredictionRecord>>> {
    let records = state.audit.list(&filter).await?;
    Ok(Json(records))
}

/// Get single recorded prediction
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PredictionRecord>> {
    let record = state
        .audit
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Prediction not found".to_string()))?;

    Ok(Json(record))
}

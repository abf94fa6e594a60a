//! Prediction handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;

use crate::{AppState, AppError, AppResult};
use crate::inference::{parse_form, parse_json, FieldIssue, ValidationError};
use crate::pipeline::{self, PipelineError};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub id: i64,
    pub prediction: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

enum BodyFormat {
    Json,
    Form,
    Other(String),
}

fn body_format(req: &Request) -> BodyFormat {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

    match content_type.as_deref() {
        None | Some("application/json") => BodyFormat::Json,
        Some("application/x-www-form-urlencoded") => BodyFormat::Form,
        Some(other) if other.ends_with("+json") => BodyFormat::Json,
        Some(other) => BodyFormat::Other(other.to_string()),
    }
}

fn body_error(message: String) -> ValidationError {
    ValidationError {
        issues: vec![FieldIssue::with_message("body", message)],
    }
}

/// `POST /predict` - JSON in, JSON out; form in, HTML out.
pub async fn predict(State(state): State<AppState>, req: Request) -> Response {
    match body_format(&req) {
        BodyFormat::Json => match Bytes::from_request(req, &state).await {
            Ok(bytes) => predict_json(State(state), bytes).await.into_response(),
            Err(rejection) => rejection.into_response(),
        },
        BodyFormat::Form => predict_form(state, req).await,
        BodyFormat::Other(content_type) => AppError::Validation(body_error(format!(
            "unsupported content type '{content_type}', send JSON or form fields"
        )))
        .into_response(),
    }
}

/// `POST /api/v1/predict`
pub async fn predict_json(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<PredictResponse>> {
    let record = pipeline::run(&state.predictor, state.audit.as_ref(), || {
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| body_error(format!("malformed JSON: {e}")))?;
        parse_json(&value)
    })
    .await?;

    Ok(Json(PredictResponse {
        id: record.id,
        prediction: record.prediction,
        label: state.predictor.label_name(record.prediction).map(str::to_string),
    }))
}

async fn predict_form(state: AppState, req: Request) -> Response {
    let fields = match Form::<HashMap<String, String>>::from_request(req, &state).await {
        Ok(Form(fields)) => fields,
        Err(rejection) => {
            let err = body_error(rejection.body_text());
            return rerender_form(&state, &HashMap::new(), &err);
        }
    };

    match pipeline::run(&state.predictor, state.audit.as_ref(), || parse_form(&fields)).await {
        Ok(record) => state
            .templates
            .result_page(&record, state.predictor.label_name(record.prediction))
            .into_response(),
        Err(PipelineError::Validation(err)) => rerender_form(&state, &fields, &err),
        Err(other) => AppError::from(other).into_response(),
    }
}

/// 422 with the submitted values and their errors filled back in
fn rerender_form(state: &AppState, fields: &HashMap<String, String>, err: &ValidationError) -> Response {
    match state.templates.input_form(fields, Some(err)) {
        Ok(page) => (StatusCode::UNPROCESSABLE_ENTITY, page).into_response(),
        Err(e) => e.into_response(),
    }
}

//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::{header, StatusCode},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::inference::{PredictionError, ValidationError};
use crate::store::PersistenceError;

pub type AppResult<T> = Result<T, AppError>;

/// Fatal errors raised before the listener is bound.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{0} is not set in the environment variables")]
    MissingVar(&'static str),

    #[error("failed to load model: {0}")]
    Model(#[from] crate::inference::ModelLoadError),

    #[error("failed to compile page templates: {0}")]
    Template(#[from] minijinja::Error),

    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    Unauthorized,
    Forbidden,

    // Resource errors
    NotFound(String),
    AlreadyExists(String),

    // Input errors
    Validation(ValidationError),

    // Pipeline errors
    Prediction(PredictionError),
    Persistence(PersistenceError),

    // Database errors outside the audit store
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid authentication credentials"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "You do not have permission to access this resource"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::AlreadyExists(msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::Validation(err) => {
                let body = Json(json!({
                    "error": "Invalid input",
                    "status": StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                    "fields": err.issues,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Prediction(err) => {
                tracing::error!("Prediction error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Persistence(err) => {
                tracing::error!("Persistence error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        if matches!(self, AppError::Unauthorized) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        AppError::Prediction(err)
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::Persistence(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::validate::{FieldIssue, IssueKind};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_422_with_fields() {
        let err = ValidationError {
            issues: vec![FieldIssue::new("petal_width", IssueKind::Missing)],
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["status"], 422);
        assert_eq!(body["fields"][0]["field"], "petal_width");
        assert_eq!(body["fields"][0]["message"], "field required");
    }

    #[tokio::test]
    async fn test_persistence_error_is_opaque() {
        let err = PersistenceError::Unavailable("connection refused (10.0.0.4:5432)".to_string());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("10.0.0.4"));
    }

    #[tokio::test]
    async fn test_prediction_error_is_opaque() {
        let err = PredictionError::Backend("Non-zero status code returned while running ArgMax".into());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("ArgMax"));
    }

    #[tokio::test]
    async fn test_internal_error_is_opaque() {
        let err = AppError::InternalError("failed to render result.html: undefined value".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_json(response).await.to_string().contains("result.html"));
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_resource_errors() {
        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("Prediction not found".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::AlreadyExists("Email already registered".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_missing_var_message() {
        let err = StartupError::MissingVar("DATABASE_URL");
        assert_eq!(err.to_string(), "DATABASE_URL is not set in the environment variables");
    }
}

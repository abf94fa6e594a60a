//! Prediction audit model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use chrono::{DateTime, Utc};

use crate::inference::PredictionRequest;

/// Default and maximum page sizes for audit listings
pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
    pub prediction: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PredictionFilter {
    pub prediction: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PredictionFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

impl PredictionRecord {
    pub fn inputs(&self) -> PredictionRequest {
        PredictionRequest {
            sepal_length: self.sepal_length,
            sepal_width: self.sepal_width,
            petal_length: self.petal_length,
            petal_width: self.petal_width,
        }
    }

    pub async fn insert(
        conn: &mut PgConnection,
        request: &PredictionRequest,
        prediction: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r#"
            INSERT INTO iris_predictions (sepal_length, sepal_width, petal_length, petal_width, prediction)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(request.sepal_length)
        .bind(request.sepal_width)
        .bind(request.petal_length)
        .bind(request.petal_width)
        .bind(prediction)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>("SELECT * FROM iris_predictions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, filter: &PredictionFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT * FROM iris_predictions
            WHERE ($1::INT IS NULL OR prediction = $1)
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(filter.prediction)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_bounds() {
        let filter = PredictionFilter::default();
        assert_eq!(filter.limit(), DEFAULT_LIMIT);
        assert_eq!(filter.offset(), 0);

        let filter = PredictionFilter { prediction: None, limit: Some(10_000), offset: Some(-5) };
        assert_eq!(filter.limit(), MAX_LIMIT);
        assert_eq!(filter.offset(), 0);

        let filter = PredictionFilter { prediction: Some(1), limit: Some(0), offset: Some(20) };
        assert_eq!(filter.limit(), 1);
        assert_eq!(filter.offset(), 20);
    }
}

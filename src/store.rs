//! Audit Store - append-only log of successful predictions
//!
//! Every write runs in its own transaction on a pooled connection. The
//! transaction guard rolls back and returns the connection to the pool when
//! dropped, so no exit path leaks a connection or leaves a partial row.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::inference::PredictionRequest;
use crate::models::{PredictionFilter, PredictionRecord};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for a database connection")]
    Timeout,

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => PersistenceError::Timeout,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                PersistenceError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.constraint().is_some() => {
                PersistenceError::Constraint(err.to_string())
            }
            other => PersistenceError::Database(other.to_string()),
        }
    }
}

#[axum::async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably append one record. Atomic: the row exists in full or not at all.
    async fn record(
        &self,
        request: &PredictionRequest,
        prediction: i32,
    ) -> Result<PredictionRecord, PersistenceError>;

    async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>, PersistenceError>;

    async fn find(&self, id: i64) -> Result<Option<PredictionRecord>, PersistenceError>;
}

pub type SharedAuditStore = Arc<dyn AuditStore>;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[axum::async_trait]
impl AuditStore for PgAuditStore {
    async fn record(
        &self,
        request: &PredictionRequest,
        prediction: i32,
    ) -> Result<PredictionRecord, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let record = PredictionRecord::insert(&mut *tx, request, prediction).await?;
        tx.commit().await?;

        tracing::debug!(id = record.id, prediction, "audit row committed");
        Ok(record)
    }

    async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>, PersistenceError> {
        Ok(PredictionRecord::list(&self.pool, filter).await?)
    }

    async fn find(&self, id: i64) -> Result<Option<PredictionRecord>, PersistenceError> {
        Ok(PredictionRecord::find_by_id(&self.pool, id).await?)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-process stores for tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    pub struct MemoryAuditStore {
        rows: Mutex<Vec<PredictionRecord>>,
    }

    impl MemoryAuditStore {
        pub fn rows(&self) -> Vec<PredictionRecord> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[axum::async_trait]
    impl AuditStore for MemoryAuditStore {
        async fn record(
            &self,
            request: &PredictionRequest,
            prediction: i32,
        ) -> Result<PredictionRecord, PersistenceError> {
            let mut rows = self.rows.lock().unwrap();
            let record = PredictionRecord {
                id: rows.len() as i64 + 1,
                sepal_length: request.sepal_length,
                sepal_width: request.sepal_width,
                petal_length: request.petal_length,
                petal_width: request.petal_width,
                prediction,
                created_at: Utc::now(),
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>, PersistenceError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|r| filter.prediction.map_or(true, |p| r.prediction == p))
                .skip(filter.offset() as usize)
                .take(filter.limit() as usize)
                .cloned()
                .collect())
        }

        async fn find(&self, id: i64) -> Result<Option<PredictionRecord>, PersistenceError> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }
    }

    /// Store whose database is unreachable.
    #[derive(Default)]
    pub struct UnreachableAuditStore {
        pub attempts: AtomicUsize,
    }

    #[axum::async_trait]
    impl AuditStore for UnreachableAuditStore {
        async fn record(
            &self,
            _request: &PredictionRequest,
            _prediction: i32,
        ) -> Result<PredictionRecord, PersistenceError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::Unavailable("connection refused".into()))
        }

        async fn list(&self, _filter: &PredictionFilter) -> Result<Vec<PredictionRecord>, PersistenceError> {
            Err(PersistenceError::Unavailable("connection refused".into()))
        }

        async fn find(&self, _id: i64) -> Result<Option<PredictionRecord>, PersistenceError> {
            Err(PersistenceError::Unavailable("connection refused".into()))
        }
    }
}

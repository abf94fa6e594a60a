//! Database module - PostgreSQL connection and schema

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Apply the schema. Safe to run on every start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Prediction audit log (append only)
CREATE TABLE IF NOT EXISTS iris_predictions (
    id BIGSERIAL PRIMARY KEY,
    sepal_length DOUBLE PRECISION NOT NULL,
    sepal_width DOUBLE PRECISION NOT NULL,
    petal_length DOUBLE PRECISION NOT NULL,
    petal_width DOUBLE PRECISION NOT NULL,
    prediction INT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Users (toy token lookup by name)
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    role VARCHAR(20) NOT NULL DEFAULT 'user',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_predictions_label ON iris_predictions(prediction);
CREATE INDEX IF NOT EXISTS idx_predictions_created ON iris_predictions(created_at);
CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);
"#;

/// Live database for tests that exercise the real SQL.
///
/// Set `TEST_DATABASE_URL` (or `DATABASE_URL`) to a disposable database to run
/// them; without it they return early.
#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use sqlx::PgPool;

    pub async fn pool() -> Option<PgPool> {
        dotenvy::dotenv().ok();
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok()?;

        let pool = super::create_pool(&url, 5, Duration::from_secs(5))
            .await
            .expect("test database unreachable");
        super::run_migrations(&pool).await.expect("schema failed to apply");
        Some(pool)
    }

    /// Value unlikely to collide with rows left by other runs.
    pub fn unique_marker() -> i32 {
        use std::sync::atomic::{AtomicI32, Ordering};
        static NEXT: AtomicI32 = AtomicI32::new(0);

        let nanos = chrono::Utc::now().timestamp_subsec_nanos() as i32;
        1_000 + (nanos % 10_000_000) * 100 + NEXT.fetch_add(1, Ordering::Relaxed) % 100
    }
}

#[cfg(test)]
mod tests {
    use super::SCHEMA_SQL;

    #[test]
    fn test_schema_is_idempotent() {
        for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let ddl = statement
                .lines()
                .filter(|l| !l.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join(" ");
            assert!(ddl.contains("IF NOT EXISTS"), "not idempotent: {ddl}");
        }
    }

    #[tokio::test]
    async fn test_migrations_run_twice() {
        let Some(pool) = super::testing::pool().await else { return };
        super::run_migrations(&pool).await.unwrap();
    }
}

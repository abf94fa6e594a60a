//! Iris inference service
//!
//! Validates four flower measurements, classifies them with a model loaded
//! once at startup, and appends every successful prediction to an audit
//! table before answering.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        IRIS SERVICE                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────┐   ┌─────────────────────┐  │
//! │  │ Validator │──►│  Prediction  │──►│    Audit Store      │  │
//! │  │ JSON/Form │   │  Service     │   │  (append only)      │  │
//! │  └───────────┘   └──────────────┘   └──────────┬──────────┘  │
//! │        ▲          model loaded once            │             │
//! │  ┌─────┴──────────────────┐                    ▼             │
//! │  │ API / HTML (Axum)      │             ┌─────────────┐      │
//! │  └────────────────────────┘             │ PostgreSQL  │      │
//! │                                         └─────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod inference;
mod middleware;
mod models;
mod pipeline;
mod store;
mod views;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
    services::ServeDir,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, LogFormat};
use inference::PredictionService;
use store::{PgAuditStore, SharedAuditStore};
use views::Templates;

pub use error::{AppError, AppResult, StartupError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing(LogFormat::from_env());

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Iris service starting...");
    tracing::info!("Database: {}", config.database_host());

    tracing::info!("Environment: {}", config.environment);

    // Model and templates first: either failing must stop us before the database is touched
    let predictor = PredictionService::load(&config.model_path, config.model_labels.clone())
        .map_err(StartupError::from)?;
    let templates = Templates::new().map_err(StartupError::from)?;

    // Initialize database pool
    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await
    .map_err(StartupError::from)?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await.map_err(StartupError::from)?;

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        predictor,
        templates,
        audit: Arc::new(PgAuditStore::new(pool.clone())),
    };

    // Build router
    let app = create_router(state, &config.static_dir);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(StartupError::from)?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Closing database pool...");
    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "iris_service=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: Config,
    pub predictor: PredictionService,
    pub templates: Templates,
    pub audit: SharedAuditStore,
}

/// Create the main router with all routes
fn create_router(state: AppState, static_dir: &Path) -> Router {
    // Inference
    let inference_routes = Router::new()
        .route("/", get(handlers::pages::index))
        .route("/predict", post(handlers::predict::predict))
        .route("/api/v1/predict", post(handlers::predict::predict_json))
        .route("/api/v1/model", get(handlers::model::info))
        .route("/api/v1/predictions", get(handlers::predictions::list))
        .route("/api/v1/predictions/:id", get(handlers::predictions::get));

    // Users (toy token auth via `?token=`), also served at the root paths
    let user_routes = Router::new()
        .route("/api/v1/users", post(handlers::users::create).get(handlers::users::list))
        .route("/api/v1/profile", get(handlers::users::profile))
        .route("/api/v1/admin", get(handlers::users::admin))
        .route("/users", post(handlers::users::create).get(handlers::users::list))
        .route("/users/", post(handlers::users::create).get(handlers::users::list))
        .route("/profile", get(handlers::users::profile))
        .route("/admin", get(handlers::users::admin));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health::check))
        .merge(inference_routes)
        .merge(user_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

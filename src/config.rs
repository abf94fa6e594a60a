//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StartupError;

const DEFAULT_LABELS: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (required)
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Path of the ONNX classifier
    pub model_path: PathBuf,

    /// Class names, indexed by the model's output label
    pub model_labels: Vec<String>,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// How long a request may wait for a pooled connection
    pub db_acquire_timeout: Duration,

    /// Environment (development, production)
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read before `Config`, whose parsing may already log warnings.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `LOG_FORMAT` wins; otherwise production logs JSON.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some(_) => LogFormat::Pretty,
            None if lookup("ENVIRONMENT").as_deref() == Some("production") => LogFormat::Json,
            None => LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(StartupError::MissingVar("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", 8000),
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| "models/iris.onnx".to_string())
                .into(),
            model_labels: parse_labels(lookup("MODEL_LABELS")),
            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| "static".to_string())
                .into(),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 5)),
            environment: lookup("ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
        })
    }

    /// Database URL with the credentials part stripped, for logging.
    pub fn database_host(&self) -> &str {
        self.database_url.split('@').last().unwrap_or("***")
    }
}

fn parse_labels(raw: Option<String>) -> Vec<String> {
    let labels: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
    } else {
        labels
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let result = Config::from_lookup(lookup_from(&[("PORT", "9000")]));
        assert!(matches!(result, Err(StartupError::MissingVar("DATABASE_URL"))));
    }

    #[test]
    fn test_blank_database_url_is_fatal() {
        let result = Config::from_lookup(lookup_from(&[("DATABASE_URL", "  ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://iris:secret@db:5432/iris",
        )]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.model_path, PathBuf::from("models/iris.onnx"));
        assert_eq!(config.model_labels, vec!["setosa", "versicolor", "virginica"]);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.environment, "development");
        assert_eq!(config.database_host(), "db:5432/iris");
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/iris"),
            ("PORT", "not-a-port"),
            ("DB_MAX_CONNECTIONS", "3"),
            ("MODEL_LABELS", " a, b ,,c "),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.db_max_connections, 3);
        assert_eq!(config.model_labels, vec!["a", "b", "c"]);
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn test_blank_labels_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/iris"),
            ("MODEL_LABELS", " , "),
        ]))
        .unwrap();
        assert_eq!(config.model_labels.len(), 3);
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::from_lookup(lookup_from(&[])), LogFormat::Pretty);
        assert_eq!(
            LogFormat::from_lookup(lookup_from(&[("LOG_FORMAT", "json")])),
            LogFormat::Json
        );
        assert_eq!(
            LogFormat::from_lookup(lookup_from(&[("ENVIRONMENT", "production")])),
            LogFormat::Json
        );
        assert_eq!(
            LogFormat::from_lookup(lookup_from(&[
                ("ENVIRONMENT", "production"),
                ("LOG_FORMAT", "pretty"),
            ])),
            LogFormat::Pretty
        );
    }
}

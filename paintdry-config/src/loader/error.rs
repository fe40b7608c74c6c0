use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ConfigValidationError;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid update interval '{value}'")]
    InvalidInterval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
    #[error("failed to load .env file")]
    EnvFile(#[from] dotenvy::Error),
}

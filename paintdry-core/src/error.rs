use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported module '{module}' referenced by resource '{resource}'")]
    UnsupportedModule { module: String, resource: String },

    #[error("Protocol violation from module '{module}': {reason}")]
    ProtocolViolation { module: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<paintdry_model::ModelError> for PipelineError {
    fn from(err: paintdry_model::ModelError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

impl From<paintdry_config::ConfigValidationError> for PipelineError {
    fn from(err: paintdry_config::ConfigValidationError) -> Self {
        match err {
            paintdry_config::ConfigValidationError::UnsupportedModule {
                module,
                resource,
            } => PipelineError::UnsupportedModule { module, resource },
            other => PipelineError::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

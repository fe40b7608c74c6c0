use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("usage: <module> example | <input_dir> <output_dir> [cache_dir] | (no arguments for stdin/stdout)")]
    Usage,

    #[error("queue directory {path} does not exist")]
    MissingDirectory { path: PathBuf },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stream I/O error")]
    Stream(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("module failure: {0}")]
    Module(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

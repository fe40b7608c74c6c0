use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug)]
pub enum ModelError {
    UnknownSeverity(String),
    InvalidTimestamp(i64),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownSeverity(raw) => {
                write!(f, "unknown severity: {raw:?}")
            }
            ModelError::InvalidTimestamp(ts) => {
                write!(f, "timestamp out of range: {ts}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

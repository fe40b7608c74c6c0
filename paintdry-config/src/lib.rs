//! Configuration library for paintdry.
//!
//! Loads the JSON configuration file (targets and worker modules), overlays
//! environment variables and `.env`, and rejects configurations the pipeline
//! cannot run with before any pass starts.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, ModuleConfig, TransportKind,
    UpdaterConfig,
};
pub use sources::{EnvConfig, FileConfig, FileTarget};
pub use validation::{
    ConfigValidationError, ConfigWarning, ConfigWarnings, validate_module_name,
};

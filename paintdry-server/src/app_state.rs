use std::{fmt, sync::Arc};

use paintdry_config::Config;
use paintdry_core::{ResourceStore, SnapshotWriter};
use serde_json::Value;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    /// Credential-free view of the loaded configuration.
    pub config_view: Arc<Value>,
    pub snapshots: SnapshotWriter,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, config: &Config) -> Self {
        Self {
            store,
            config_view: Arc::new(config.public_view()),
            snapshots: SnapshotWriter::new(&config.updater.state_dir),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

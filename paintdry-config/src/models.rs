use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use paintdry_model::Target;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configured `(resource, module)` pairs, seeded into the store every pass.
    pub targets: Vec<Target>,
    /// Worker modules keyed by module name.
    pub modules: BTreeMap<String, ModuleConfig>,
    pub updater: UpdaterConfig,
    pub database: DatabaseConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.get(name)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// The part of the configuration that is safe to show over the read API.
    /// Database credentials are never included.
    pub fn public_view(&self) -> Value {
        json!({
            "targets": self.targets,
            "modules": self.modules,
        })
    }
}

/// How a module's worker process is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON array files in per-module request/response directories.
    #[default]
    Files,
    /// Newline-delimited JSON over the worker's stdin/stdout.
    Pipe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Shell command that starts the worker. Queue directories are appended
    /// as positional arguments for the file transport.
    pub command: String,
    /// Slow modules are run by an external scheduler; the supervisor only
    /// queues their requests and drains their responses.
    #[serde(default)]
    pub slow: bool,
    #[serde(default)]
    pub transport: TransportKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Sleep between passes in `update-forever` mode.
    pub interval: Duration,
    /// Holds `metadata.json` and the `snapshots/` folder.
    pub state_dir: PathBuf,
    /// Root of the per-module `modules/<name>/{requests,responses}` queues.
    pub queue_dir: PathBuf,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            state_dir: PathBuf::from("./state"),
            queue_dir: PathBuf::from("./mount-state"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Connection attempts before startup gives up.
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_attempts: 10,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("connect_attempts", &self.connect_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

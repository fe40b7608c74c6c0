use std::collections::BTreeMap;
use std::path::PathBuf;

use paintdry_model::Target;
use serde::{Deserialize, Serialize};

use crate::models::ModuleConfig;

/// Raw configuration as written in the JSON file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub targets: Vec<FileTarget>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
    #[serde(default)]
    pub updater: FileUpdaterConfig,
}

/// A target entry. Both the single-pair form and the grouped form are
/// accepted; the grouped form expands to every `(resource, module)` pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FileTarget {
    Single { resource: String, module: String },
    Grouped {
        modules: Vec<String>,
        resources: Vec<String>,
    },
}

impl FileTarget {
    pub fn expand(&self) -> Vec<Target> {
        match self {
            FileTarget::Single { resource, module } => vec![Target {
                resource: resource.clone(),
                module: module.clone(),
            }],
            FileTarget::Grouped { modules, resources } => modules
                .iter()
                .flat_map(|module| {
                    resources.iter().map(move |resource| Target {
                        resource: resource.clone(),
                        module: module.clone(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileUpdaterConfig {
    /// Humantime duration such as `"60s"` or `"5m"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_dir: Option<PathBuf>,
}

/// Environment overrides. Values here win over the file.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub db_connect_attempts: Option<u32>,
    pub state_dir: Option<PathBuf>,
    pub queue_dir: Option<PathBuf>,
    pub update_interval: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("PAINTDRY_CONFIG").ok().map(PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
            db_connect_attempts: std::env::var("PAINTDRY_DB_CONNECT_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok()),
            state_dir: std::env::var("PAINTDRY_STATE_DIR").ok().map(PathBuf::from),
            queue_dir: std::env::var("PAINTDRY_QUEUE_DIR").ok().map(PathBuf::from),
            update_interval: std::env::var("PAINTDRY_UPDATE_INTERVAL").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_targets_expand_to_cross_product() {
        let raw = r#"{"modules": ["dns", "http"], "resources": ["a.com", "b.com"]}"#;
        let target: FileTarget = serde_json::from_str(raw).unwrap();
        let pairs = target.expand();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.contains(&Target {
            resource: "b.com".into(),
            module: "http".into()
        }));
    }

    #[test]
    fn single_target_form_is_accepted() {
        let raw = r#"{"resource": "example.com", "module": "dns"}"#;
        let target: FileTarget = serde_json::from_str(raw).unwrap();
        assert_eq!(
            target.expand(),
            vec![Target {
                resource: "example.com".into(),
                module: "dns".into()
            }]
        );
    }
}

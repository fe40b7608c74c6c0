pub mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use paintdry_model::Target;
use tracing::debug;

use self::error::ConfigLoadError;
use crate::{
    models::{Config, ConfigMetadata, DatabaseConfig, UpdaterConfig},
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigWarnings},
};

/// Searched in order when neither `--config` nor `PAINTDRY_CONFIG` is set.
const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["config/config-override.json", "config/config.json"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment.
    pub env: Option<EnvConfig>,
    /// Do not look for a `.env` file at all.
    pub skip_env_file: bool,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self.options.skip_env_file = true;
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;

        let env_config = match &self.options.env {
            Some(env) => env.clone(),
            None => EnvConfig::gather(),
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;
        let config_present = file_config.is_some();

        let (config, mut warnings) = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;

        if !config_present {
            warnings.push_with_hint(
                "No configuration file detected; running without targets or modules",
                "Create config/config.json or pass --config",
            );
        }

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        debug!(path = %path.display(), "reading configuration file");
        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidInterval {
            value: raw.to_string(),
            source,
        }
    })
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let FileConfig {
        targets: file_targets,
        modules,
        updater: file_updater,
    } = file;

    let mut targets: Vec<Target> = Vec::new();
    for target in file_targets.iter().flat_map(|t| t.expand()) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    let defaults = UpdaterConfig::default();
    let interval = match env.update_interval.as_deref().or(file_updater.interval.as_deref())
    {
        Some(raw) => parse_interval(raw)?,
        None => defaults.interval,
    };
    let updater = UpdaterConfig {
        interval,
        state_dir: env
            .state_dir
            .or(file_updater.state_dir)
            .unwrap_or(defaults.state_dir),
        queue_dir: env
            .queue_dir
            .or(file_updater.queue_dir)
            .unwrap_or(defaults.queue_dir),
    };

    let database = DatabaseConfig {
        url: env.database_url,
        connect_attempts: env
            .db_connect_attempts
            .filter(|attempts| *attempts > 0)
            .unwrap_or(DatabaseConfig::default().connect_attempts),
    };

    let config = Config {
        targets,
        modules,
        updater,
        database,
        metadata,
    };

    let warnings = validation::validate(&config)?;
    Ok((config, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransportKind;
    use crate::validation::ConfigValidationError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn loader_for(path: &Path, env: EnvConfig) -> ConfigLoader {
        ConfigLoader::new().with_config_path(path).with_env(env)
    }

    #[test]
    fn loads_targets_and_modules() {
        let file = write_config(
            r#"{
                "targets": [
                    {"modules": ["dns", "http"], "resources": ["example.com"]},
                    {"resource": "example.org", "module": "dns"}
                ],
                "modules": {
                    "dns": {"command": "python3 -m dns_module"},
                    "http": {"command": "./http-module", "slow": true, "transport": "pipe"}
                }
            }"#,
        );

        let load = loader_for(file.path(), EnvConfig::default()).load().unwrap();
        let config = load.config;

        assert_eq!(config.targets.len(), 3);
        let http = config.module("http").unwrap();
        assert!(http.slow);
        assert_eq!(http.transport, TransportKind::Pipe);
        assert_eq!(config.module("dns").unwrap().transport, TransportKind::Files);
        assert_eq!(config.updater, UpdaterConfig::default());
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
        // slow + pipe is accepted, with a warning
        assert_eq!(load.warnings.items.len(), 1);
        assert!(load.warnings.items[0].message.contains("'http'"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let file = write_config(
            r#"{"updater": {"interval": "5m", "state_dir": "/var/lib/paintdry"}}"#,
        );
        let env = EnvConfig {
            update_interval: Some("30s".into()),
            queue_dir: Some("/srv/queues".into()),
            database_url: Some("postgres://localhost/paintdry".into()),
            ..EnvConfig::default()
        };

        let config = loader_for(file.path(), env).load().unwrap().config;
        assert_eq!(config.updater.interval, Duration::from_secs(30));
        assert_eq!(config.updater.state_dir, PathBuf::from("/var/lib/paintdry"));
        assert_eq!(config.updater.queue_dir, PathBuf::from("/srv/queues"));
        assert_eq!(config.database.connect_attempts, 10);
        assert!(config.database.url.is_some());
    }

    #[test]
    fn target_with_unconfigured_module_is_fatal() {
        let file = write_config(
            r#"{
                "targets": [{"resource": "example.com", "module": "whois"}],
                "modules": {"dns": {"command": "dns-module"}}
            }"#,
        );

        let err = loader_for(file.path(), EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Validation(ConfigValidationError::UnsupportedModule { ref module, .. })
                if module == "whois"
        ));
    }

    #[test]
    fn invalid_module_name_is_fatal() {
        let file = write_config(r#"{"modules": {"dns.v2": {"command": "x"}}}"#);
        let err = loader_for(file.path(), EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Validation(ConfigValidationError::InvalidModuleName { .. })
        ));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = loader_for(&missing, EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let file = write_config("{ not json");
        let err = loader_for(file.path(), EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }

    #[test]
    fn bad_interval_is_rejected() {
        let file = write_config(r#"{"updater": {"interval": "soon"}}"#);
        let err = loader_for(file.path(), EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::InvalidInterval { .. }));
    }

    #[test]
    fn duplicate_targets_are_collapsed() {
        let file = write_config(
            r#"{
                "targets": [
                    {"resource": "example.com", "module": "dns"},
                    {"modules": ["dns"], "resources": ["example.com"]}
                ],
                "modules": {"dns": {"command": "dns-module"}}
            }"#,
        );
        let config = loader_for(file.path(), EnvConfig::default())
            .load()
            .unwrap()
            .config;
        assert_eq!(config.targets.len(), 1);
    }
}

use thiserror::Error;

use crate::models::{Config, TransportKind};

/// Characters that would break queue paths or the worker command line.
const FORBIDDEN_MODULE_CHARS: [char; 7] = [' ', '/', ',', '.', '\'', '"', '\n'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("invalid module name {name:?}: {reason}")]
    InvalidModuleName { name: String, reason: String },
    #[error("target '{resource}' references unsupported module '{module}'")]
    UnsupportedModule { module: String, resource: String },
    #[error("target for module '{module}' has an empty resource")]
    EmptyResource { module: String },
    #[error("module '{module}' has an empty command")]
    EmptyCommand { module: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn validate_module_name(name: &str) -> Result<(), ConfigValidationError> {
    if name.is_empty() {
        return Err(ConfigValidationError::InvalidModuleName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if let Some(bad) = name.chars().find(|c| FORBIDDEN_MODULE_CHARS.contains(c)) {
        return Err(ConfigValidationError::InvalidModuleName {
            name: name.to_string(),
            reason: format!("contains forbidden character {bad:?}"),
        });
    }
    Ok(())
}

/// Reject configurations the pipeline cannot run with. Anything returned
/// here is fatal at startup.
pub fn validate(config: &Config) -> Result<ConfigWarnings, ConfigValidationError> {
    let mut warnings = ConfigWarnings::default();

    for (name, module) in &config.modules {
        validate_module_name(name)?;
        if module.command.trim().is_empty() {
            return Err(ConfigValidationError::EmptyCommand {
                module: name.clone(),
            });
        }
        if module.slow && module.transport == TransportKind::Pipe {
            warnings.push_with_hint(
                format!("Module '{name}' is slow but uses the pipe transport; its requests are never delivered"),
                "Slow modules are run by an external scheduler and need \"transport\": \"files\"",
            );
        }
    }

    for target in &config.targets {
        if target.resource.trim().is_empty() {
            return Err(ConfigValidationError::EmptyResource {
                module: target.module.clone(),
            });
        }
        if !config.modules.contains_key(&target.module) {
            return Err(ConfigValidationError::UnsupportedModule {
                module: target.module.clone(),
                resource: target.resource.clone(),
            });
        }
    }

    if config.modules.is_empty() {
        warnings.push_with_hint(
            "No worker modules configured; update passes will only seed targets",
            "Add entries under \"modules\" in config.json",
        );
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_reject_path_and_quote_characters() {
        assert!(validate_module_name("dns").is_ok());
        assert!(validate_module_name("github_repos").is_ok());
        for bad in ["", "a b", "a/b", "a.b", "a,b", "a'b", "a\"b", "a\nb"] {
            assert!(validate_module_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn slow_pipe_module_is_warned_about() {
        use crate::models::{ConfigMetadata, DatabaseConfig, ModuleConfig, UpdaterConfig};

        let config = Config {
            targets: Vec::new(),
            modules: [(
                "github".to_string(),
                ModuleConfig {
                    command: "github-worker".into(),
                    slow: true,
                    transport: TransportKind::Pipe,
                },
            )]
            .into_iter()
            .collect(),
            updater: UpdaterConfig::default(),
            database: DatabaseConfig::default(),
            metadata: ConfigMetadata::default(),
        };

        let warnings = validate(&config).unwrap();
        assert_eq!(warnings.items.len(), 1);
        assert!(warnings.items[0].message.contains("github"));
    }
}

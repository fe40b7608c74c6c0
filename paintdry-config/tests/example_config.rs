use std::path::PathBuf;
use std::time::Duration;

use paintdry_config::{ConfigLoader, EnvConfig, TransportKind};

fn example_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/config.example.json")
}

#[test]
fn shipped_example_config_loads() {
    let loaded = ConfigLoader::new()
        .with_config_path(example_path())
        .with_env(EnvConfig::default())
        .load()
        .expect("example config is valid");
    let config = loaded.config;

    // One single target plus a 2x2 grouped entry.
    assert_eq!(config.targets.len(), 5);
    assert_eq!(
        config.module_names().collect::<Vec<_>>(),
        vec!["dns", "example", "github", "http"]
    );
    assert_eq!(config.module("dns").unwrap().transport, TransportKind::Pipe);
    assert_eq!(config.module("http").unwrap().transport, TransportKind::Files);
    assert!(config.module("github").unwrap().slow);
    assert_eq!(config.updater.interval, Duration::from_secs(300));
    assert!(loaded.warnings.is_empty());
}

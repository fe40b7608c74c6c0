//! # paintdry
//!
//! Continuous discovery and observation of an organisation's external
//! footprint. `update-once` and `update-forever` drive the worker modules and
//! record what they report; `serve` exposes the recorded state as JSON.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use paintdry_config::{Config, ConfigLoad, ConfigLoader};
use paintdry_core::{
    PostgresResourceStore, ProcessTransportFactory, ResourceStore, Updater, connect_with_retry,
};
use paintdry_server::{AppState, create_router};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "paintdry")]
#[command(about = "Discovers resources, records their observed state and tracks changes")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the read-only JSON API
    Serve(ServeArgs),
    /// Run a single update pass and exit
    UpdateOnce,
    /// Run update passes until interrupted
    UpdateForever,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "PAINTDRY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(short, long, env = "PAINTDRY_PORT", default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(cli.config)?;
    let store = connect_store(&config).await?;

    match cli.command {
        Command::Serve(args) => serve(args, &config, store).await,
        Command::UpdateOnce => {
            let mut updater = build_updater(&config, store).await?;
            updater.run_once().await.context("update pass failed")?;
            Ok(())
        }
        Command::UpdateForever => {
            let mut updater = build_updater(&config, store).await?;
            let interval = config.updater.interval;
            info!(interval = ?interval, "running update passes until interrupted");
            tokio::select! {
                result = updater.run_forever(interval) => result.context("update loop stopped"),
                _ = shutdown_signal() => {
                    info!("shutdown requested");
                    Ok(())
                }
            }
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad { config, warnings } = loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    match &config.metadata.config_path {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("running without a configuration file"),
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
    info!(
        targets = config.targets.len(),
        modules = config.modules.len(),
        state_dir = %config.updater.state_dir.display(),
        queue_dir = %config.updater.queue_dir.display(),
        "configuration in effect"
    );
    Ok(config)
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn ResourceStore>> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        anyhow::bail!("Invalid database URL: must start with postgres:// or postgresql://");
    }

    let pool = connect_with_retry(url, config.database.connect_attempts)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!("Successfully connected to PostgreSQL");
    Ok(Arc::new(PostgresResourceStore::new(pool)))
}

async fn build_updater(config: &Config, store: Arc<dyn ResourceStore>) -> anyhow::Result<Updater> {
    let factory = ProcessTransportFactory::new(&config.updater.queue_dir);
    Updater::new(store, config, &factory, &config.updater.state_dir)
        .await
        .context("failed to prepare worker modules")
}

async fn serve(
    args: ServeArgs,
    config: &Config,
    store: Arc<dyn ResourceStore>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    let router = create_router(AppState::new(store, config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "serving read API");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

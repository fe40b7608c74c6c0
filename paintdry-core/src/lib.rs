//! Paintdry core: the resource store, worker supervision and the update pass
//! that ties them together.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paintdry_config::ConfigLoader;
//! use paintdry_core::{
//!     PostgresResourceStore, ProcessTransportFactory, Updater, connect_with_retry,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let loaded = ConfigLoader::new().load()?;
//! let config = loaded.config;
//! let url = config.database.url.clone().unwrap_or_default();
//! let pool = connect_with_retry(&url, config.database.connect_attempts).await?;
//!
//! let store = Arc::new(PostgresResourceStore::new(pool));
//! let factory = ProcessTransportFactory::new(&config.updater.queue_dir);
//! let mut updater =
//!     Updater::new(store, &config, &factory, &config.updater.state_dir).await?;
//! updater.run_once().await?;
//! # Ok(())
//! # }
//! ```

/// Database connection and schema migration
pub mod database;

/// Error types shared by the pipeline
pub mod error;

pub mod orchestrator;
pub mod processor;
pub mod router;
pub mod snapshot;

/// Resource, observation and change persistence
pub mod store;

/// Worker processes and the transports that feed them
pub mod supervisor;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use database::{backoff_delay, connect_with_retry};
pub use error::{PipelineError, Result};
pub use orchestrator::{CONFIG_SOURCE, DedupCache, PassOutcome, PassState, Updater};
pub use processor::{PassReport, ResponseProcessor};
pub use router::{DiscoveryRouter, RouteDecision};
pub use snapshot::SnapshotWriter;
pub use store::{
    ChangeClassification, InMemoryResourceStore, ObservationOutcome, ObservationWrite,
    PostgresResourceStore, ResourceStore,
};
pub use supervisor::{
    FileQueueTransport, InProcessTransport, InProcessTransportFactory, ModuleSupervisor,
    PipeTransport, ProcessTransportFactory, QueueDirs, TransportFactory, WorkerTransport,
};

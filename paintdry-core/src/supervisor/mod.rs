//! Worker supervision: one [`ModuleSupervisor`] per configured module, each
//! driving its worker through a [`WorkerTransport`].

mod files;
mod in_process;
mod pipe;
mod process;

pub use files::{FileQueueTransport, QueueDirs, request_file_name};
pub use in_process::InProcessTransport;
pub use pipe::PipeTransport;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use paintdry_config::{ModuleConfig, TransportKind};
use paintdry_model::{ModuleRequest, ModuleResponse};
use paintdry_worker::WorkerModule;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// How requests reach a worker and responses come back.
#[async_trait]
pub trait WorkerTransport: Send + Sync + fmt::Debug {
    /// Hand a batch of requests to the transport without starting anything.
    async fn submit(&mut self, batch: &[ModuleRequest]) -> Result<()>;

    /// Start the worker unless it is already running.
    async fn launch(&mut self) -> Result<()>;

    fn is_running(&mut self) -> bool;

    /// Block until the current worker, if any, has exited.
    async fn wait(&mut self) -> Result<()>;

    /// Take every response that has been fully delivered so far.
    async fn collect(&mut self) -> Result<Vec<ModuleResponse>>;
}

#[derive(Debug)]
pub struct ModuleSupervisor {
    name: String,
    slow: bool,
    transport: Box<dyn WorkerTransport>,
    backlog: Vec<ModuleRequest>,
}

impl ModuleSupervisor {
    pub fn new(name: impl Into<String>, slow: bool, transport: Box<dyn WorkerTransport>) -> Self {
        Self {
            name: name.into(),
            slow,
            transport,
            backlog: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_slow(&self) -> bool {
        self.slow
    }

    /// Requests held in memory because the worker was busy.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Queue requests. If the worker is idle the whole backlog is handed to
    /// the transport and a worker is started.
    pub async fn send_requests(&mut self, requests: Vec<ModuleRequest>) -> Result<()> {
        self.backlog.extend(requests);
        if !self.backlog.is_empty() && !self.transport.is_running() {
            self.write_requests().await?;
            self.launch().await?;
        }
        Ok(())
    }

    /// Queue requests for a later run without starting a worker.
    pub async fn persist_requests(&mut self, requests: Vec<ModuleRequest>) -> Result<()> {
        self.backlog.extend(requests);
        self.write_requests().await
    }

    /// Hand the in-memory backlog to the transport without starting a worker.
    pub async fn write_requests(&mut self) -> Result<()> {
        if self.backlog.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.backlog);
        self.transport.submit(&batch).await
    }

    /// Start the worker so work left over from an earlier pass is handled.
    pub async fn start(&mut self) -> Result<()> {
        self.write_requests().await?;
        self.launch().await
    }

    async fn launch(&mut self) -> Result<()> {
        if self.slow {
            debug!(module = %self.name, "slow module, leaving launch to the external scheduler");
            return Ok(());
        }
        self.transport.launch().await
    }

    /// Responses available right now. Never blocks on the worker.
    pub async fn process_responses(&mut self) -> Result<Vec<ModuleResponse>> {
        self.transport.collect().await
    }

    /// Drain everything outstanding: wait for the running worker, start one
    /// more for anything still queued, wait for that too, then collect.
    pub async fn process_all_responses(&mut self) -> Result<Vec<ModuleResponse>> {
        self.transport.wait().await?;
        if !self.backlog.is_empty() {
            self.write_requests().await?;
            self.launch().await?;
            self.transport.wait().await?;
        }
        self.transport.collect().await
    }
}

/// Builds the transport for a configured module.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, name: &str, module: &ModuleConfig) -> Result<Box<dyn WorkerTransport>>;
}

/// Runs modules as external processes using the transport named in their
/// configuration.
#[derive(Debug, Clone)]
pub struct ProcessTransportFactory {
    queue_dir: PathBuf,
}

impl ProcessTransportFactory {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
        }
    }
}

#[async_trait]
impl TransportFactory for ProcessTransportFactory {
    async fn create(&self, name: &str, module: &ModuleConfig) -> Result<Box<dyn WorkerTransport>> {
        Ok(match module.transport {
            TransportKind::Files => {
                Box::new(FileQueueTransport::new(name, &module.command, &self.queue_dir).await?)
            }
            TransportKind::Pipe => Box::new(PipeTransport::new(name, &module.command)),
        })
    }
}

/// Serves registered [`WorkerModule`]s in-process; used by tests and
/// embedded deployments.
#[derive(Default)]
pub struct InProcessTransportFactory {
    modules: HashMap<String, Arc<dyn WorkerModule>>,
}

impl fmt::Debug for InProcessTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessTransportFactory")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InProcessTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, module: Arc<dyn WorkerModule>) -> Self {
        self.modules.insert(module.name().to_string(), module);
        self
    }
}

#[async_trait]
impl TransportFactory for InProcessTransportFactory {
    async fn create(&self, name: &str, _module: &ModuleConfig) -> Result<Box<dyn WorkerTransport>> {
        let module = self.modules.get(name).cloned().ok_or_else(|| {
            PipelineError::Config(format!("No in-process worker registered for module '{name}'"))
        })?;
        Ok(Box::new(InProcessTransport::new(module)))
    }
}

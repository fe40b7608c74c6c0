use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use paintdry_model::{ModuleRequest, ModuleResponse};
use paintdry_worker::{WorkerModule, handle_request};
use tracing::warn;

use super::WorkerTransport;
use crate::error::Result;

/// Runs a [`WorkerModule`] inside the orchestrator process. Submitted
/// requests are handled when the transport is launched; nothing is ever
/// left running, so `wait` returns immediately.
pub struct InProcessTransport {
    module: Arc<dyn WorkerModule>,
    pending: Vec<ModuleRequest>,
    responses: Vec<ModuleResponse>,
}

impl fmt::Debug for InProcessTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessTransport")
            .field("module", &self.module.name())
            .field("pending", &self.pending.len())
            .field("responses", &self.responses.len())
            .finish()
    }
}

impl InProcessTransport {
    pub fn new(module: Arc<dyn WorkerModule>) -> Self {
        Self {
            module,
            pending: Vec::new(),
            responses: Vec::new(),
        }
    }
}

#[async_trait]
impl WorkerTransport for InProcessTransport {
    async fn submit(&mut self, batch: &[ModuleRequest]) -> Result<()> {
        self.pending.extend_from_slice(batch);
        Ok(())
    }

    async fn launch(&mut self) -> Result<()> {
        for request in std::mem::take(&mut self.pending) {
            match handle_request(self.module.as_ref(), &request).await {
                Ok(responses) => self.responses.extend(responses),
                Err(err) => warn!(
                    module = self.module.name(),
                    resource = request.resource(),
                    error = %err,
                    "in-process worker failed"
                ),
            }
        }
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        false
    }

    async fn wait(&mut self) -> Result<()> {
        Ok(())
    }

    async fn collect(&mut self) -> Result<Vec<ModuleResponse>> {
        Ok(std::mem::take(&mut self.responses))
    }
}

use async_trait::async_trait;
use paintdry_model::{
    ChangeRequest, DiscoveryRequest, ModuleRequest, ModuleResponse,
    ObservationRequest,
};

use crate::error::Result;

/// Domain logic of one worker module.
///
/// Every operation has an empty default so a module only implements what it
/// understands. A change request left unanswered stays unclassified in the
/// store and is offered again on the next pass.
#[async_trait]
pub trait WorkerModule: Send + Sync {
    /// Module name as it appears in configuration and in every response.
    fn name(&self) -> &str;

    /// Requests printed by the `example` invocation mode.
    fn example_requests(&self) -> Vec<ModuleRequest> {
        Vec::new()
    }

    async fn discovery(
        &self,
        _request: &DiscoveryRequest,
    ) -> Result<Vec<ModuleResponse>> {
        Ok(Vec::new())
    }

    async fn observation(
        &self,
        _request: &ObservationRequest,
    ) -> Result<Vec<ModuleResponse>> {
        Ok(Vec::new())
    }

    async fn change(&self, _request: &ChangeRequest) -> Result<Vec<ModuleResponse>> {
        Ok(Vec::new())
    }
}

/// Dispatch one request to the matching operation handler.
pub async fn handle_request(
    module: &dyn WorkerModule,
    request: &ModuleRequest,
) -> Result<Vec<ModuleResponse>> {
    match request {
        ModuleRequest::Discovery(req) => module.discovery(req).await,
        ModuleRequest::Observation(req) => module.observation(req).await,
        ModuleRequest::Change(req) => module.change(req).await,
    }
}

//! Reference module used for smoke tests and as a template for new workers.

use async_trait::async_trait;
use paintdry_model::{
    ChangeRequest, DiscoveryRequest, DiscoveryResponse, ModuleRequest,
    ModuleResponse, ObservationRequest, ObservationResponse, Severity, now,
};
use serde_json::Value;

use crate::error::Result;
use crate::module::WorkerModule;

pub const EXAMPLE_MODULE: &str = "example";

const EXAMPLE_RESOURCE: &str = "localhost";

/// Confirms `localhost`, reports the current time as attribute `now` and
/// classifies every change as a notice.
#[derive(Debug, Default, Clone)]
pub struct ExampleModule;

#[async_trait]
impl WorkerModule for ExampleModule {
    fn name(&self) -> &str {
        EXAMPLE_MODULE
    }

    fn example_requests(&self) -> Vec<ModuleRequest> {
        vec![
            ModuleRequest::discovery(
                EXAMPLE_RESOURCE,
                EXAMPLE_MODULE,
                "config.json",
                1730241747,
            ),
            ModuleRequest::observation(EXAMPLE_RESOURCE, EXAMPLE_MODULE, 1730241747),
        ]
    }

    async fn discovery(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<Vec<ModuleResponse>> {
        if request.resource != EXAMPLE_RESOURCE {
            return Ok(Vec::new());
        }
        Ok(vec![ModuleResponse::Discovery(DiscoveryResponse {
            resource: request.resource.clone(),
            module: EXAMPLE_MODULE.to_string(),
            source: request.source.clone(),
            timestamp: request.timestamp,
        })])
    }

    async fn observation(
        &self,
        request: &ObservationRequest,
    ) -> Result<Vec<ModuleResponse>> {
        if request.resource != EXAMPLE_RESOURCE {
            return Ok(Vec::new());
        }
        let timestamp = now();
        Ok(vec![ModuleResponse::Observation(ObservationResponse {
            resource: request.resource.clone(),
            module: EXAMPLE_MODULE.to_string(),
            attribute: "now".to_string(),
            value: Value::from(timestamp),
            severity: Severity::None,
            timestamp,
        })])
    }

    async fn change(&self, request: &ChangeRequest) -> Result<Vec<ModuleResponse>> {
        Ok(vec![request.classify(Severity::Notice)])
    }
}

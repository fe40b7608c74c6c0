//! Applies worker responses to the store.

use paintdry_model::{ModuleResponse, datetime_from_epoch};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::router::{DiscoveryRouter, RouteDecision};
use crate::store::{ChangeClassification, ObservationOutcome, ObservationWrite, ResourceStore};

/// Counters for one update pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub requests_sent: usize,
    pub responses_applied: usize,
    pub discoveries_accepted: usize,
    pub discoveries_deferred: usize,
    pub observations_written: usize,
    pub changes_created: usize,
    pub classifications_applied: usize,
    pub protocol_violations: usize,
}

pub struct ResponseProcessor<'a> {
    store: &'a dyn ResourceStore,
}

impl std::fmt::Debug for ResponseProcessor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseProcessor").finish_non_exhaustive()
    }
}

impl<'a> ResponseProcessor<'a> {
    pub fn new(store: &'a dyn ResourceStore) -> Self {
        Self { store }
    }

    /// Apply every response produced by `responder`. Protocol violations are
    /// logged and counted; store failures abort.
    pub async fn apply_all(
        &self,
        router: &mut DiscoveryRouter,
        responder: &str,
        responses: Vec<ModuleResponse>,
        report: &mut PassReport,
    ) -> Result<()> {
        for response in responses {
            match self.apply(router, responder, response, report).await {
                Ok(()) => report.responses_applied += 1,
                Err(PipelineError::ProtocolViolation { module, reason }) => {
                    warn!(module = %module, %reason, "response skipped");
                    report.protocol_violations += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub async fn apply(
        &self,
        router: &mut DiscoveryRouter,
        responder: &str,
        response: ModuleResponse,
        report: &mut PassReport,
    ) -> Result<()> {
        let violation = |reason: String| PipelineError::ProtocolViolation {
            module: responder.to_string(),
            reason,
        };

        match response {
            ModuleResponse::Discovery(discovery) => {
                datetime_from_epoch(discovery.timestamp)
                    .map_err(|e| violation(e.to_string()))?;
                match router.route(self.store, responder, discovery.into()).await? {
                    RouteDecision::Accepted(_) => report.discoveries_accepted += 1,
                    RouteDecision::Deferred => report.discoveries_deferred += 1,
                }
            }
            ModuleResponse::Observation(observation) => {
                if observation.module != responder {
                    return Err(violation(format!(
                        "observation for '{}' names module '{}'",
                        observation.resource, observation.module
                    )));
                }
                let write = ObservationWrite::try_from(&observation)
                    .map_err(|e| violation(e.to_string()))?;
                let outcome = self.store.upsert_observation(&write).await?;
                report.observations_written += 1;
                if let ObservationOutcome::Changed { change_id } = outcome {
                    debug!(
                        change_id,
                        resource = %write.resource,
                        attribute = %write.attribute,
                        "value changed"
                    );
                    report.changes_created += 1;
                }
            }
            ModuleResponse::Change(change) => {
                if change.module != responder {
                    return Err(violation(format!(
                        "change classification for '{}' names module '{}'",
                        change.resource, change.module
                    )));
                }
                if !change.severity.is_classified() {
                    debug!(resource = %change.resource, attribute = %change.attribute, "change left unclassified");
                    return Ok(());
                }
                let classification = ChangeClassification::from(&change);
                if self.store.update_change(&classification).await? {
                    report.classifications_applied += 1;
                }
            }
        }
        Ok(())
    }
}

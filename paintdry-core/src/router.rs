//! Discovery routing.
//!
//! A discovery is only trusted when it comes from the module that owns the
//! resource. Anything a module reports on behalf of another module is held
//! back and re-sent to the owner, which must confirm it itself.

use std::collections::{BTreeMap, HashSet};

use paintdry_model::{Discovery, ModuleRequest, ResourceRecord};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::ResourceStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Accepted(ResourceRecord),
    Deferred,
}

#[derive(Debug, Default)]
pub struct DiscoveryRouter {
    backlog: Vec<Discovery>,
}

impl DiscoveryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backlog(&self) -> &[Discovery] {
        &self.backlog
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub async fn route(
        &mut self,
        store: &dyn ResourceStore,
        responder: &str,
        discovery: Discovery,
    ) -> Result<RouteDecision> {
        if discovery.module != responder {
            info!(
                resource = %discovery.resource,
                owner = %discovery.module,
                suggested_by = responder,
                "discovery deferred to owning module"
            );
            self.backlog.push(discovery);
            return Ok(RouteDecision::Deferred);
        }

        debug!(resource = %discovery.resource, module = responder, "discovery accepted");
        let record = store.upsert_resource(&discovery).await?;
        Ok(RouteDecision::Accepted(record))
    }

    /// Turn the backlog into one discovery request per distinct
    /// `(module, resource)`, grouped by owning module, and clear it.
    pub fn flush_backlog(&mut self) -> BTreeMap<String, Vec<ModuleRequest>> {
        let mut seen = HashSet::new();
        let mut per_module: BTreeMap<String, Vec<ModuleRequest>> = BTreeMap::new();

        for discovery in self.backlog.drain(..) {
            if !seen.insert((discovery.module.clone(), discovery.resource.clone())) {
                continue;
            }
            per_module
                .entry(discovery.module.clone())
                .or_default()
                .push(ModuleRequest::discovery(
                    discovery.resource,
                    discovery.module,
                    discovery.source,
                    discovery.timestamp,
                ));
        }
        per_module
    }
}

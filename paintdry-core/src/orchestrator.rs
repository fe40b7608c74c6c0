//! The update pass.
//!
//! One pass seeds configured targets, asks every owning module about every
//! known resource, drains the answers into the store, re-dispatches deferred
//! discoveries to their owners, asks modules to classify new changes and
//! finally commits a snapshot marker.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use paintdry_config::Config;
use paintdry_model::{
    ChangeRequest, Discovery, ModuleRequest, ResourceRecord, SnapshotMarker, Target, now,
};
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::processor::{PassReport, ResponseProcessor};
use crate::router::DiscoveryRouter;
use crate::snapshot::SnapshotWriter;
use crate::store::ResourceStore;
use crate::supervisor::{ModuleSupervisor, TransportFactory};

/// Source recorded for resources seeded from configuration.
pub const CONFIG_SOURCE: &str = "config";

/// `(module, resource)` pairs already asked about during the current pass.
#[derive(Debug, Default)]
pub struct DedupCache {
    requested: HashSet<(String, String)>,
}

impl DedupCache {
    /// Returns true the first time a pair is marked.
    pub fn mark(&mut self, module: &str, resource: &str) -> bool {
        self.requested
            .insert((module.to_string(), resource.to_string()))
    }

    pub fn contains(&self, module: &str, resource: &str) -> bool {
        self.requested
            .contains(&(module.to_string(), resource.to_string()))
    }

    pub fn len(&self) -> usize {
        self.requested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}

/// State that lives for exactly one pass.
#[derive(Debug, Default)]
pub struct PassState {
    pub cache: DedupCache,
    pub router: DiscoveryRouter,
    pub report: PassReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub report: PassReport,
    pub snapshot: SnapshotMarker,
}

pub struct Updater {
    store: Arc<dyn ResourceStore>,
    targets: Vec<Target>,
    supervisors: BTreeMap<String, ModuleSupervisor>,
    snapshots: SnapshotWriter,
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("targets", &self.targets.len())
            .field("supervisors", &self.supervisors)
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Build supervisors for every configured module. A target naming a
    /// module without configuration is rejected here, before any pass runs.
    pub async fn new(
        store: Arc<dyn ResourceStore>,
        config: &Config,
        factory: &dyn TransportFactory,
        state_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if let Some(target) = config
            .targets
            .iter()
            .find(|t| !config.modules.contains_key(&t.module))
        {
            return Err(PipelineError::UnsupportedModule {
                module: target.module.clone(),
                resource: target.resource.clone(),
            });
        }

        let mut supervisors = BTreeMap::new();
        for (name, module) in &config.modules {
            let transport = factory.create(name, module).await?;
            supervisors.insert(
                name.clone(),
                ModuleSupervisor::new(name.clone(), module.slow, transport),
            );
        }

        Ok(Self {
            store,
            targets: config.targets.clone(),
            supervisors,
            snapshots: SnapshotWriter::new(state_dir),
        })
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn supervisor(&self, module: &str) -> Option<&ModuleSupervisor> {
        self.supervisors.get(module)
    }

    /// Run passes forever, sleeping `interval` between them. A failed pass
    /// is logged and retried on the next tick.
    pub async fn run_forever(&mut self, interval: Duration) -> Result<()> {
        loop {
            if let Err(err) = self.run_once().await {
                error!(error = %err, "update pass failed");
            }
            info!(interval = ?interval, "sleeping until next pass");
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn run_once(&mut self) -> Result<PassOutcome> {
        let mut pass = PassState::default();
        info!(modules = self.supervisors.len(), targets = self.targets.len(), "update pass started");

        self.seed_config().await?;
        self.start_modules().await;
        self.request_classifications(&mut pass).await?;
        self.initiate_all(&mut pass).await?;

        self.drain(&mut pass, false).await?;
        self.drain(&mut pass, true).await?;
        self.flush_backlog(&mut pass).await?;

        let classifying = self.request_classifications(&mut pass).await?;
        self.drain_modules(&mut pass, &classifying).await?;
        self.persist_backlog(&mut pass).await?;

        let snapshot = self.snapshots.commit(Utc::now()).await?;
        let report = pass.report;
        info!(
            seq = snapshot.seq,
            requests_sent = report.requests_sent,
            responses_applied = report.responses_applied,
            discoveries_accepted = report.discoveries_accepted,
            discoveries_deferred = report.discoveries_deferred,
            observations_written = report.observations_written,
            changes_created = report.changes_created,
            classifications_applied = report.classifications_applied,
            protocol_violations = report.protocol_violations,
            "update pass finished"
        );
        Ok(PassOutcome { report, snapshot })
    }

    /// Make sure every configured target exists as a resource.
    pub async fn seed_config(&self) -> Result<usize> {
        let timestamp = now();
        for target in &self.targets {
            if !self.supervisors.contains_key(&target.module) {
                return Err(PipelineError::UnsupportedModule {
                    module: target.module.clone(),
                    resource: target.resource.clone(),
                });
            }
            self.store
                .upsert_resource(&Discovery {
                    resource: target.resource.clone(),
                    module: target.module.clone(),
                    source: CONFIG_SOURCE.to_string(),
                    timestamp,
                })
                .await?;
        }
        Ok(self.targets.len())
    }

    async fn start_modules(&mut self) {
        for (name, supervisor) in self.supervisors.iter_mut() {
            if let Err(err) = supervisor.start().await {
                warn!(module = %name, error = %err, "failed to start module");
            }
        }
    }

    async fn initiate_all(&mut self, pass: &mut PassState) -> Result<()> {
        let resources = self.store.resources().await?;
        for resource in &resources {
            self.initiate_requests(pass, resource).await;
        }
        Ok(())
    }

    /// Send one discovery + observation pair for `resource` to its owning
    /// module, unless that pair was already sent this pass. Returns whether
    /// requests were sent.
    pub async fn initiate_requests(
        &mut self,
        pass: &mut PassState,
        resource: &ResourceRecord,
    ) -> bool {
        if !pass.cache.mark(&resource.module, &resource.resource) {
            return false;
        }
        let Some(supervisor) = self.supervisors.get_mut(&resource.module) else {
            warn!(
                module = %resource.module,
                resource = %resource.resource,
                "resource owned by a module that is not configured"
            );
            return false;
        };

        let timestamp = now();
        let requests = vec![
            ModuleRequest::discovery(
                resource.resource.as_str(),
                resource.module.as_str(),
                resource.source.as_str(),
                timestamp,
            ),
            ModuleRequest::observation(
                resource.resource.as_str(),
                resource.module.as_str(),
                timestamp,
            ),
        ];
        let count = requests.len();
        match supervisor.send_requests(requests).await {
            Ok(()) => {
                pass.report.requests_sent += count;
                true
            }
            Err(err) => {
                warn!(module = %resource.module, resource = %resource.resource, error = %err, "failed to send requests");
                false
            }
        }
    }

    /// Ask owning modules to classify every change still marked unknown.
    /// Returns the modules that were sent requests.
    async fn request_classifications(&mut self, pass: &mut PassState) -> Result<Vec<String>> {
        let changes = self.store.unclassified_changes().await?;
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let timestamp = now();
        let mut per_module: BTreeMap<String, Vec<ModuleRequest>> = BTreeMap::new();
        for change in changes {
            per_module
                .entry(change.module.clone())
                .or_default()
                .push(ModuleRequest::Change(ChangeRequest {
                    resource: change.resource,
                    module: change.module,
                    timestamp,
                    attribute: change.attribute,
                    old_value: change.old_value,
                    new_value: change.new_value,
                }));
        }

        let mut sent = Vec::new();
        for (module, requests) in per_module {
            let Some(supervisor) = self.supervisors.get_mut(&module) else {
                warn!(module = %module, changes = requests.len(), "cannot classify changes for unconfigured module");
                continue;
            };
            info!(module = %module, changes = requests.len(), "requesting change classification");
            let count = requests.len();
            match supervisor.send_requests(requests).await {
                Ok(()) => {
                    pass.report.requests_sent += count;
                    sent.push(module);
                }
                Err(err) => warn!(module = %module, error = %err, "failed to send change requests"),
            }
        }
        Ok(sent)
    }

    /// Collect responses from every module. Blocking mode waits for each
    /// worker to finish its queue first.
    async fn drain(&mut self, pass: &mut PassState, blocking: bool) -> Result<()> {
        let modules: Vec<String> = self.supervisors.keys().cloned().collect();
        self.drain_inner(pass, &modules, blocking).await
    }

    async fn drain_modules(&mut self, pass: &mut PassState, modules: &[String]) -> Result<()> {
        self.drain_inner(pass, modules, true).await
    }

    async fn drain_inner(
        &mut self,
        pass: &mut PassState,
        modules: &[String],
        blocking: bool,
    ) -> Result<()> {
        let processor = ResponseProcessor::new(self.store.as_ref());
        for name in modules {
            let Some(supervisor) = self.supervisors.get_mut(name) else {
                continue;
            };
            let collected = if blocking {
                supervisor.process_all_responses().await
            } else {
                supervisor.process_responses().await
            };
            match collected {
                Ok(responses) => {
                    processor
                        .apply_all(&mut pass.router, name, responses, &mut pass.report)
                        .await?
                }
                Err(err) => warn!(module = %name, error = %err, "failed to collect responses"),
            }
        }
        Ok(())
    }

    /// Re-dispatch deferred discoveries to their owners and give those
    /// modules one more round to confirm them.
    async fn flush_backlog(&mut self, pass: &mut PassState) -> Result<()> {
        if pass.router.is_empty() {
            return Ok(());
        }
        info!(deferred = pass.router.backlog().len(), "flushing discovery backlog");
        let affected = self.dispatch_backlog(pass, true).await;
        self.drain_modules(pass, &affected).await?;
        Ok(())
    }

    /// Anything deferred during the final rounds is written to the owner's
    /// queue and picked up when the next pass starts the module.
    async fn persist_backlog(&mut self, pass: &mut PassState) -> Result<()> {
        if !pass.router.is_empty() {
            self.dispatch_backlog(pass, false).await;
        }
        Ok(())
    }

    async fn dispatch_backlog(&mut self, pass: &mut PassState, launch: bool) -> Vec<String> {
        let mut affected = Vec::new();
        for (module, requests) in pass.router.flush_backlog() {
            let Some(supervisor) = self.supervisors.get_mut(&module) else {
                warn!(module = %module, discoveries = requests.len(), "dropping discoveries for unconfigured module");
                continue;
            };
            let count = requests.len();
            let sent = if launch {
                supervisor.send_requests(requests).await
            } else {
                supervisor.persist_requests(requests).await
            };
            match sent {
                Ok(()) => {
                    pass.report.requests_sent += count;
                    affected.push(module);
                }
                Err(err) => warn!(module = %module, error = %err, "failed to dispatch backlog"),
            }
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use paintdry_config::{ConfigMetadata, DatabaseConfig, ModuleConfig, UpdaterConfig};
    use paintdry_model::{ModuleResponse, ObservationRequest};
    use paintdry_worker::WorkerModule;

    use crate::store::InMemoryResourceStore;
    use crate::supervisor::InProcessTransportFactory;

    #[derive(Debug, Default)]
    struct CountingModule {
        observed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkerModule for CountingModule {
        fn name(&self) -> &str {
            "dns"
        }

        async fn observation(
            &self,
            request: &ObservationRequest,
        ) -> paintdry_worker::Result<Vec<ModuleResponse>> {
            self.observed.lock().unwrap().push(request.resource.clone());
            Ok(Vec::new())
        }
    }

    fn config(targets: &[(&str, &str)]) -> Config {
        Config {
            targets: targets
                .iter()
                .map(|(resource, module)| Target {
                    resource: resource.to_string(),
                    module: module.to_string(),
                })
                .collect(),
            modules: BTreeMap::from([(
                "dns".to_string(),
                ModuleConfig {
                    command: "unused".into(),
                    slow: false,
                    transport: Default::default(),
                },
            )]),
            updater: UpdaterConfig::default(),
            database: DatabaseConfig::default(),
            metadata: ConfigMetadata::default(),
        }
    }

    #[test]
    fn dedup_cache_marks_each_pair_once() {
        let mut cache = DedupCache::default();
        assert!(cache.mark("dns", "example.com"));
        assert!(!cache.mark("dns", "example.com"));
        assert!(cache.mark("http", "example.com"));
        assert!(cache.contains("dns", "example.com"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn a_resource_is_asked_about_once_per_pass() {
        let state = tempfile::tempdir().unwrap();
        let module = Arc::new(CountingModule::default());
        let factory = InProcessTransportFactory::new().register(module.clone());
        let store = Arc::new(InMemoryResourceStore::new());
        let mut updater = Updater::new(store, &config(&[]), &factory, state.path())
            .await
            .unwrap();

        let record = updater
            .store()
            .upsert_resource(&Discovery {
                resource: "example.com".into(),
                module: "dns".into(),
                source: CONFIG_SOURCE.into(),
                timestamp: 1730241747,
            })
            .await
            .unwrap();

        let mut pass = PassState::default();
        assert!(updater.initiate_requests(&mut pass, &record).await);
        assert!(!updater.initiate_requests(&mut pass, &record).await);
        assert_eq!(pass.report.requests_sent, 2);
        assert_eq!(*module.observed.lock().unwrap(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn resources_of_unconfigured_modules_are_skipped() {
        let state = tempfile::tempdir().unwrap();
        let factory =
            InProcessTransportFactory::new().register(Arc::new(CountingModule::default()));
        let store = Arc::new(InMemoryResourceStore::new());
        let mut updater = Updater::new(store, &config(&[]), &factory, state.path())
            .await
            .unwrap();

        let orphan = updater
            .store()
            .upsert_resource(&Discovery {
                resource: "example.com".into(),
                module: "retired".into(),
                source: CONFIG_SOURCE.into(),
                timestamp: 1730241747,
            })
            .await
            .unwrap();

        let mut pass = PassState::default();
        assert!(!updater.initiate_requests(&mut pass, &orphan).await);
        assert_eq!(pass.report.requests_sent, 0);
    }

    #[tokio::test]
    async fn target_with_unconfigured_module_is_rejected() {
        let state = tempfile::tempdir().unwrap();
        let factory =
            InProcessTransportFactory::new().register(Arc::new(CountingModule::default()));
        let store = Arc::new(InMemoryResourceStore::new());
        let err = Updater::new(
            store,
            &config(&[("example.com", "tls")]),
            &factory,
            state.path(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::UnsupportedModule { ref module, ref resource }
                if module == "tls" && resource == "example.com"
        ));
    }
}

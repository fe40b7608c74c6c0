use async_trait::async_trait;
use paintdry_model::{
    ChangeRecord, Discovery, ObservationRecord, ResourceRecord, SearchHit,
    SearchPage, Severity, datetime_from_epoch,
};
use tokio::sync::Mutex;

use super::search;
use super::{
    ChangeClassification, ObservationOutcome, ObservationWrite, ResourceStore,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct Tables {
    resources: Vec<ResourceRecord>,
    observations: Vec<ObservationRecord>,
    changes: Vec<ChangeRecord>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same upsert and change semantics as the
/// PostgreSQL adapter.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    tables: Mutex<Tables>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn upsert_resource(&self, discovery: &Discovery) -> Result<ResourceRecord> {
        let seen_at = datetime_from_epoch(discovery.timestamp)?;
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables
            .resources
            .iter_mut()
            .find(|r| r.resource == discovery.resource && r.module == discovery.module)
        {
            existing.last_seen = seen_at;
            return Ok(existing.clone());
        }

        let record = ResourceRecord {
            id: tables.allocate_id(),
            resource: discovery.resource.clone(),
            module: discovery.module.clone(),
            source: discovery.source.clone(),
            first_seen: seen_at,
            last_seen: seen_at,
        };
        tables.resources.push(record.clone());
        Ok(record)
    }

    async fn upsert_observation(
        &self,
        observation: &ObservationWrite,
    ) -> Result<ObservationOutcome> {
        let mut tables = self.tables.lock().await;

        let position = tables.observations.iter().position(|o| {
            o.resource == observation.resource
                && o.module == observation.module
                && o.attribute == observation.attribute
        });

        let Some(index) = position else {
            let record = ObservationRecord {
                id: tables.allocate_id(),
                resource: observation.resource.clone(),
                module: observation.module.clone(),
                attribute: observation.attribute.clone(),
                value: observation.value.clone(),
                first_seen: observation.observed_at,
                last_changed: observation.observed_at,
                last_seen: observation.observed_at,
                severity: observation.severity,
            };
            tables.observations.push(record);
            return Ok(ObservationOutcome::Inserted);
        };

        let old_value = tables.observations[index].value.clone();
        {
            let row = &mut tables.observations[index];
            row.last_seen = observation.observed_at;
            row.severity = observation.severity;
        }
        if old_value == observation.value {
            return Ok(ObservationOutcome::Refreshed);
        }

        {
            let row = &mut tables.observations[index];
            row.value = observation.value.clone();
            row.last_changed = observation.observed_at;
        }
        let change_id = tables.allocate_id();
        tables.changes.push(ChangeRecord {
            id: change_id,
            resource: observation.resource.clone(),
            module: observation.module.clone(),
            attribute: observation.attribute.clone(),
            old_value,
            new_value: observation.value.clone(),
            timestamp: observation.observed_at,
            severity: Severity::Unknown,
        });
        Ok(ObservationOutcome::Changed { change_id })
    }

    async fn update_change(&self, classification: &ChangeClassification) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut updated = false;
        for change in tables.changes.iter_mut().filter(|c| {
            !c.severity.is_classified()
                && c.resource == classification.resource
                && c.module == classification.module
                && c.attribute == classification.attribute
                && c.old_value == classification.old_value
                && c.new_value == classification.new_value
        }) {
            change.severity = classification.severity;
            updated = true;
        }
        Ok(updated)
    }

    async fn resources(&self) -> Result<Vec<ResourceRecord>> {
        Ok(self.tables.lock().await.resources.clone())
    }

    async fn resource(&self, id: i64) -> Result<Option<ResourceRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.resources.iter().find(|r| r.id == id).cloned())
    }

    async fn observations(&self) -> Result<Vec<ObservationRecord>> {
        Ok(self.tables.lock().await.observations.clone())
    }

    async fn observation(&self, id: i64) -> Result<Option<ObservationRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.observations.iter().find(|o| o.id == id).cloned())
    }

    async fn changes(&self) -> Result<Vec<ChangeRecord>> {
        Ok(self.tables.lock().await.changes.clone())
    }

    async fn change(&self, id: i64) -> Result<Option<ChangeRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.changes.iter().find(|c| c.id == id).cloned())
    }

    async fn unclassified_changes(&self) -> Result<Vec<ChangeRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .changes
            .iter()
            .filter(|c| !c.severity.is_classified())
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage> {
        if query.is_empty() {
            let (page, _) = search::page_window(page);
            return Ok(SearchPage::empty(query, page));
        }
        let tables = self.tables.lock().await;
        let hits: Vec<SearchHit> = tables
            .resources
            .iter()
            .map(search::resource_hit)
            .chain(tables.observations.iter().map(search::observation_hit))
            .chain(tables.changes.iter().map(search::change_hit))
            .filter(|hit| search::matches(hit, query))
            .collect();
        Ok(search::paginate(query, hits, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paintdry_model::SearchKind;

    fn discovery(resource: &str, module: &str, source: &str, ts: i64) -> Discovery {
        Discovery {
            resource: resource.into(),
            module: module.into(),
            source: source.into(),
            timestamp: ts,
        }
    }

    fn observed(value: &str, ts: i64) -> ObservationWrite {
        ObservationWrite {
            resource: "example.com".into(),
            module: "dns".into(),
            attribute: "ip".into(),
            value: value.into(),
            severity: Severity::None,
            observed_at: datetime_from_epoch(ts).unwrap(),
        }
    }

    #[tokio::test]
    async fn rediscovery_only_refreshes_last_seen() {
        let store = InMemoryResourceStore::new();
        let first = store
            .upsert_resource(&discovery("example.com", "dns", "config", 100))
            .await
            .unwrap();
        let second = store
            .upsert_resource(&discovery("example.com", "dns", "http", 200))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.source, "config");
        assert_eq!(second.first_seen.timestamp(), 100);
        assert_eq!(second.last_seen.timestamp(), 200);
        assert_eq!(store.resources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_value_twice_is_idempotent() {
        let store = InMemoryResourceStore::new();
        assert_eq!(
            store.upsert_observation(&observed("1.1.1.1", 100)).await.unwrap(),
            ObservationOutcome::Inserted
        );
        assert_eq!(
            store.upsert_observation(&observed("1.1.1.1", 200)).await.unwrap(),
            ObservationOutcome::Refreshed
        );

        let rows = store.observations().await.unwrap();
        assert_eq!(rows[0].last_changed.timestamp(), 100);
        assert_eq!(rows[0].last_seen.timestamp(), 200);
        assert!(store.changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn value_change_records_one_unknown_change() {
        let store = InMemoryResourceStore::new();
        store.upsert_observation(&observed("a", 100)).await.unwrap();
        let outcome = store.upsert_observation(&observed("b", 200)).await.unwrap();
        assert!(matches!(outcome, ObservationOutcome::Changed { .. }));

        let changes = store.changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, "a");
        assert_eq!(changes[0].new_value, "b");
        assert_eq!(changes[0].severity, Severity::Unknown);
        assert_eq!(store.observations().await.unwrap()[0].last_changed.timestamp(), 200);
    }

    #[tokio::test]
    async fn classified_change_is_never_overwritten() {
        let store = InMemoryResourceStore::new();
        store.upsert_observation(&observed("a", 100)).await.unwrap();
        store.upsert_observation(&observed("b", 200)).await.unwrap();

        let mut classification = ChangeClassification {
            resource: "example.com".into(),
            module: "dns".into(),
            attribute: "ip".into(),
            old_value: "a".into(),
            new_value: "b".into(),
            severity: Severity::Notice,
        };
        assert!(store.update_change(&classification).await.unwrap());
        assert!(store.unclassified_changes().await.unwrap().is_empty());

        classification.severity = Severity::Critical;
        assert!(!store.update_change(&classification).await.unwrap());
        assert_eq!(store.changes().await.unwrap()[0].severity, Severity::Notice);
    }

    #[tokio::test]
    async fn search_spans_tables_and_paginates() {
        let store = InMemoryResourceStore::new();
        for i in 0..60 {
            store
                .upsert_resource(&discovery(&format!("host{i:02}.example.com"), "dns", "config", 1))
                .await
                .unwrap();
        }
        store.upsert_observation(&observed("93.184.216.34", 1)).await.unwrap();

        let first = store.search("example.com", 1).await.unwrap();
        assert_eq!(first.total_results, 61);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.results.len(), 50);

        let second = store.search("example.com", 2).await.unwrap();
        assert_eq!(second.results.len(), 11);

        let by_value = store.search("93.184", 1).await.unwrap();
        assert_eq!(by_value.total_results, 1);
        assert_eq!(by_value.results[0].kind, SearchKind::Observation);

        let empty = store.search("", 0).await.unwrap();
        assert_eq!(empty.total_results, 0);
        assert_eq!(empty.page, 1);
    }

    #[tokio::test]
    async fn search_orders_hits_like_postgres() {
        let store = InMemoryResourceStore::new();
        for name in ["zeta.example.com", "alpha.example.com"] {
            store
                .upsert_resource(&discovery(name, "dns", "config", 1))
                .await
                .unwrap();
        }

        let page = store.search("example.com", 0).await.unwrap();
        assert_eq!(page.page, 1);
        let order: Vec<&str> = page.results.iter().map(|hit| hit.resource.as_str()).collect();
        assert_eq!(order, vec!["alpha.example.com", "zeta.example.com"]);
    }
}

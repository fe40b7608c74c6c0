#![cfg(feature = "pg-tests")]

use chrono::{TimeZone, Utc};
use paintdry_core::{
    ChangeClassification, ObservationOutcome, ObservationWrite, PostgresResourceStore,
    ResourceStore,
};
use paintdry_model::{Discovery, SearchKind, Severity};
use sqlx::PgPool;

fn discovery(resource: &str, module: &str, source: &str, timestamp: i64) -> Discovery {
    Discovery {
        resource: resource.into(),
        module: module.into(),
        source: source.into(),
        timestamp,
    }
}

fn write(value: &str, at: i64) -> ObservationWrite {
    ObservationWrite {
        resource: "example.com".into(),
        module: "dns".into(),
        attribute: "ip".into(),
        value: value.into(),
        severity: Severity::None,
        observed_at: Utc.timestamp_opt(at, 0).unwrap(),
    }
}

#[sqlx::test(migrator = "paintdry_core::MIGRATOR")]
async fn rediscovery_keeps_first_seen_and_source(pool: PgPool) {
    let store = PostgresResourceStore::new(pool);

    let first = store
        .upsert_resource(&discovery("example.com", "dns", "config", 1730241747))
        .await
        .unwrap();
    let again = store
        .upsert_resource(&discovery("example.com", "dns", "http", 1730241800))
        .await
        .unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(again.source, "config");
    assert_eq!(again.first_seen, first.first_seen);
    assert!(again.last_seen > first.last_seen);
    assert_eq!(store.resources().await.unwrap().len(), 1);
}

#[sqlx::test(migrator = "paintdry_core::MIGRATOR")]
async fn value_transition_creates_one_unclassified_change(pool: PgPool) {
    let store = PostgresResourceStore::new(pool);

    assert_eq!(
        store.upsert_observation(&write("a", 100)).await.unwrap(),
        ObservationOutcome::Inserted
    );
    assert_eq!(
        store.upsert_observation(&write("a", 200)).await.unwrap(),
        ObservationOutcome::Refreshed
    );
    let outcome = store.upsert_observation(&write("b", 300)).await.unwrap();
    assert!(matches!(outcome, ObservationOutcome::Changed { .. }));

    let observation = &store.observations().await.unwrap()[0];
    assert_eq!(observation.value, "b");
    assert_eq!(observation.last_changed.timestamp(), 300);
    assert_eq!(observation.first_seen.timestamp(), 100);

    let pending = store.unclassified_changes().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].old_value, "a");
    assert_eq!(pending[0].new_value, "b");
    assert_eq!(pending[0].severity, Severity::Unknown);
}

#[sqlx::test(migrator = "paintdry_core::MIGRATOR")]
async fn classification_is_applied_once(pool: PgPool) {
    let store = PostgresResourceStore::new(pool);
    store.upsert_observation(&write("a", 100)).await.unwrap();
    store.upsert_observation(&write("b", 200)).await.unwrap();

    let mut classification = ChangeClassification {
        resource: "example.com".into(),
        module: "dns".into(),
        attribute: "ip".into(),
        old_value: "a".into(),
        new_value: "b".into(),
        severity: Severity::High,
    };
    assert!(store.update_change(&classification).await.unwrap());

    classification.severity = Severity::Low;
    assert!(!store.update_change(&classification).await.unwrap());

    let changes = store.changes().await.unwrap();
    assert_eq!(changes[0].severity, Severity::High);
    assert!(store.unclassified_changes().await.unwrap().is_empty());
}

#[sqlx::test(migrator = "paintdry_core::MIGRATOR")]
async fn search_spans_all_tables(pool: PgPool) {
    let store = PostgresResourceStore::new(pool);
    store
        .upsert_resource(&discovery("example.com", "dns", "config", 100))
        .await
        .unwrap();
    store.upsert_observation(&write("a", 100)).await.unwrap();
    store.upsert_observation(&write("b", 200)).await.unwrap();
    store
        .upsert_resource(&discovery("other.org", "dns", "config", 100))
        .await
        .unwrap();

    let page = store.search("example", 1).await.unwrap();
    assert_eq!(page.total_results, 3);
    assert_eq!(page.total_pages, 1);
    let kinds: Vec<SearchKind> = page.results.iter().map(|hit| hit.kind).collect();
    assert!(kinds.contains(&SearchKind::Resource));
    assert!(kinds.contains(&SearchKind::Observation));
    assert!(kinds.contains(&SearchKind::Change));

    let beyond = store.search("example", 9).await.unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.page, 9);
}

#[sqlx::test(migrator = "paintdry_core::MIGRATOR")]
async fn hand_edited_severity_does_not_break_reads(pool: PgPool) {
    let store = PostgresResourceStore::new(pool.clone());
    store.upsert_observation(&write("a", 100)).await.unwrap();
    store.upsert_observation(&write("b", 200)).await.unwrap();

    sqlx::query("UPDATE changes SET severity = 'needs-review'")
        .execute(&pool)
        .await
        .unwrap();

    let changes = store.changes().await.unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].severity.is_classified());
    assert!(store.unclassified_changes().await.unwrap().is_empty());
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paintdry_model::{
    ChangeRecord, Discovery, ObservationRecord, ResourceRecord, SearchHit,
    SearchKind, SearchPage, Severity, datetime_from_epoch,
};
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::warn;

use super::search::page_window;
use super::{
    ChangeClassification, ObservationOutcome, ObservationWrite, ResourceStore,
};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct PostgresResourceStore {
    pool: PgPool,
}

fn db_err(context: &str) -> impl FnOnce(sqlx::Error) -> PipelineError + '_ {
    move |e| PipelineError::Database(format!("{context}: {e}"))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| PipelineError::Database(format!("Failed to read {name}: {e}")))
}

fn severity_column(row: &PgRow) -> Result<Severity> {
    let raw: String = column(row, "severity")?;
    Ok(stored_severity(&raw))
}

/// Severity text edited by hand may be outside the known set. Such a row was
/// still classified by someone, so it reads as `Notice` instead of failing.
fn stored_severity(raw: &str) -> Severity {
    raw.parse().unwrap_or_else(|_| {
        warn!(severity = raw, "unrecognised stored severity read as notice");
        Severity::Notice
    })
}

impl PostgresResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_resource(row: &PgRow) -> Result<ResourceRecord> {
        Ok(ResourceRecord {
            id: column(row, "id")?,
            resource: column(row, "resource")?,
            module: column(row, "module")?,
            source: column(row, "source")?,
            first_seen: column(row, "first_seen")?,
            last_seen: column(row, "last_seen")?,
        })
    }

    fn map_observation(row: &PgRow) -> Result<ObservationRecord> {
        Ok(ObservationRecord {
            id: column(row, "id")?,
            resource: column(row, "resource")?,
            module: column(row, "module")?,
            attribute: column(row, "attribute")?,
            value: column(row, "value")?,
            first_seen: column(row, "first_seen")?,
            last_changed: column(row, "last_changed")?,
            last_seen: column(row, "last_seen")?,
            severity: severity_column(row)?,
        })
    }

    fn map_change(row: &PgRow) -> Result<ChangeRecord> {
        Ok(ChangeRecord {
            id: column(row, "id")?,
            resource: column(row, "resource")?,
            module: column(row, "module")?,
            attribute: column(row, "attribute")?,
            old_value: column(row, "old_value")?,
            new_value: column(row, "new_value")?,
            timestamp: column(row, "timestamp")?,
            severity: severity_column(row)?,
        })
    }

    fn map_search_hit(row: &PgRow) -> Result<SearchHit> {
        let kind = match column::<String>(row, "type")?.as_str() {
            "resource" => SearchKind::Resource,
            "observation" => SearchKind::Observation,
            "change" => SearchKind::Change,
            other => {
                return Err(PipelineError::Database(format!(
                    "Unexpected search row type '{other}'"
                )));
            }
        };
        let details = match column::<Value>(row, "expanded_data")? {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        Ok(SearchHit {
            kind,
            id: column(row, "id")?,
            resource: column(row, "resource")?,
            module: column(row, "module")?,
            attribute: column(row, "attribute")?,
            details,
        })
    }
}

const RESOURCE_COLUMNS: &str = "id, resource, module, source, first_seen, last_seen";
const OBSERVATION_COLUMNS: &str =
    "id, resource, module, attribute, value, first_seen, last_changed, last_seen, severity";
const CHANGE_COLUMNS: &str =
    "id, resource, module, attribute, old_value, new_value, timestamp, severity";

#[async_trait]
impl ResourceStore for PostgresResourceStore {
    async fn upsert_resource(&self, discovery: &Discovery) -> Result<ResourceRecord> {
        let seen_at: DateTime<Utc> = datetime_from_epoch(discovery.timestamp)?;
        let row = sqlx::query(
            r#"
            INSERT INTO resources (resource, module, source, first_seen, last_seen)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT ON CONSTRAINT resources_constraint
            DO UPDATE SET last_seen = EXCLUDED.last_seen
            RETURNING id, resource, module, source, first_seen, last_seen
            "#,
        )
        .bind(&discovery.resource)
        .bind(&discovery.module)
        .bind(&discovery.source)
        .bind(seen_at)
        .fetch_one(self.pool())
        .await
        .map_err(db_err("Failed to upsert resource"))?;

        Self::map_resource(&row)
    }

    async fn upsert_observation(
        &self,
        observation: &ObservationWrite,
    ) -> Result<ObservationOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin observation transaction"))?;

        let previous: Option<String> = sqlx::query(
            r#"
            SELECT value FROM observations
            WHERE resource = $1 AND module = $2 AND attribute = $3
            FOR UPDATE
            "#,
        )
        .bind(&observation.resource)
        .bind(&observation.module)
        .bind(&observation.attribute)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to read previous observation"))?
        .map(|row| column(&row, "value"))
        .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO observations
                (resource, module, attribute, value, first_seen, last_changed, last_seen, severity)
            VALUES ($1, $2, $3, $4, $5, $5, $5, $6)
            ON CONFLICT ON CONSTRAINT observations_constraint
            DO UPDATE SET
                last_seen = EXCLUDED.last_seen,
                value = EXCLUDED.value,
                severity = EXCLUDED.severity,
                last_changed = CASE
                    WHEN observations.value IS DISTINCT FROM EXCLUDED.value
                    THEN EXCLUDED.last_changed
                    ELSE observations.last_changed
                END
            "#,
        )
        .bind(&observation.resource)
        .bind(&observation.module)
        .bind(&observation.attribute)
        .bind(&observation.value)
        .bind(observation.observed_at)
        .bind(observation.severity.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to upsert observation"))?;

        let outcome = match previous {
            None => ObservationOutcome::Inserted,
            Some(old) if old == observation.value => ObservationOutcome::Refreshed,
            Some(old) => {
                let change_id: i64 = sqlx::query(
                    r#"
                    INSERT INTO changes
                        (resource, module, attribute, old_value, new_value, timestamp, severity)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(&observation.resource)
                .bind(&observation.module)
                .bind(&observation.attribute)
                .bind(&old)
                .bind(&observation.value)
                .bind(observation.observed_at)
                .bind(Severity::Unknown.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err("Failed to record change"))?
                .try_get("id")
                .map_err(db_err("Failed to read change id"))?;
                ObservationOutcome::Changed { change_id }
            }
        };

        tx.commit()
            .await
            .map_err(db_err("Failed to commit observation"))?;
        Ok(outcome)
    }

    async fn update_change(&self, classification: &ChangeClassification) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE changes
            SET severity = $1
            WHERE severity IN ('', 'unknown')
              AND resource = $2
              AND module = $3
              AND attribute = $4
              AND old_value = $5
              AND new_value = $6
            "#,
        )
        .bind(classification.severity.as_str())
        .bind(&classification.resource)
        .bind(&classification.module)
        .bind(&classification.attribute)
        .bind(&classification.old_value)
        .bind(&classification.new_value)
        .execute(self.pool())
        .await
        .map_err(db_err("Failed to update change"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn resources(&self) -> Result<Vec<ResourceRecord>> {
        let rows = sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(db_err("Failed to list resources"))?;
        rows.iter().map(Self::map_resource).collect()
    }

    async fn resource(&self, id: i64) -> Result<Option<ResourceRecord>> {
        let row = sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err("Failed to load resource"))?;
        row.as_ref().map(Self::map_resource).transpose()
    }

    async fn observations(&self) -> Result<Vec<ObservationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(db_err("Failed to list observations"))?;
        rows.iter().map(Self::map_observation).collect()
    }

    async fn observation(&self, id: i64) -> Result<Option<ObservationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err("Failed to load observation"))?;
        row.as_ref().map(Self::map_observation).transpose()
    }

    async fn changes(&self) -> Result<Vec<ChangeRecord>> {
        let rows = sqlx::query(&format!("SELECT {CHANGE_COLUMNS} FROM changes ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(db_err("Failed to list changes"))?;
        rows.iter().map(Self::map_change).collect()
    }

    async fn change(&self, id: i64) -> Result<Option<ChangeRecord>> {
        let row = sqlx::query(&format!("SELECT {CHANGE_COLUMNS} FROM changes WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err("Failed to load change"))?;
        row.as_ref().map(Self::map_change).transpose()
    }

    async fn unclassified_changes(&self) -> Result<Vec<ChangeRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHANGE_COLUMNS} FROM changes WHERE severity IN ('', 'unknown') ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(db_err("Failed to list unclassified changes"))?;
        rows.iter().map(Self::map_change).collect()
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage> {
        let (page, offset) = page_window(page);
        if query.is_empty() {
            return Ok(SearchPage::empty(query, page));
        }
        let pattern = format!("%{query}%");

        let rows = sqlx::query(
            r#"
            WITH all_results AS (
                SELECT 'resource' AS type, id, resource, module, NULL::TEXT AS attribute,
                    json_build_object(
                        'first_seen', first_seen,
                        'last_seen', last_seen,
                        'source', source) AS expanded_data
                FROM resources
                UNION ALL
                SELECT 'observation' AS type, id, resource, module, attribute,
                    json_build_object(
                        'first_seen', first_seen,
                        'last_seen', last_seen,
                        'value', value,
                        'severity', severity) AS expanded_data
                FROM observations
                UNION ALL
                SELECT 'change' AS type, id, resource, module, attribute,
                    json_build_object(
                        'timestamp', timestamp,
                        'old_value', old_value,
                        'new_value', new_value,
                        'severity', severity) AS expanded_data
                FROM changes
            ),
            filtered_results AS (
                SELECT *, COUNT(*) OVER() AS total_count
                FROM all_results
                WHERE resource LIKE $1
                   OR attribute LIKE $1
                   OR id::VARCHAR LIKE $1
                   OR type LIKE $1
                   OR expanded_data::VARCHAR LIKE $1
            )
            SELECT total_count, id, resource, attribute, type, module,
                   expanded_data::JSONB AS expanded_data
            FROM filtered_results
            ORDER BY resource, attribute, type, module, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(i64::from(SearchPage::PER_PAGE))
        .bind(offset as i64)
        .fetch_all(self.pool())
        .await
        .map_err(db_err("Failed to search"))?;

        let total_results = match rows.first() {
            Some(row) => column::<i64>(row, "total_count")? as u64,
            None => 0,
        };
        let results = rows
            .iter()
            .map(Self::map_search_hit)
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchPage {
            query: query.to_string(),
            results,
            page,
            per_page: SearchPage::PER_PAGE,
            total_results,
            total_pages: SearchPage::total_pages_for(total_results),
        })
    }
}

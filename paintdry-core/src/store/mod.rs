//! Resource store port and its adapters.
//!
//! The store owns every resource, observation and change row. All writes are
//! single-row upserts keyed by natural identity, so replaying a response file
//! is harmless.

mod memory;
mod postgres;
pub(crate) mod search;

pub use memory::InMemoryResourceStore;
pub use postgres::PostgresResourceStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paintdry_model::{
    ChangeRecord, ChangeResponse, Discovery, ObservationRecord,
    ObservationResponse, ResourceRecord, SearchPage, Severity,
    datetime_from_epoch, value_to_db_string,
};

use crate::error::Result;

/// An observation ready to be written, with its value already normalised to
/// the stored text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationWrite {
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub value: String,
    pub severity: Severity,
    pub observed_at: DateTime<Utc>,
}

impl TryFrom<&ObservationResponse> for ObservationWrite {
    type Error = crate::error::PipelineError;

    fn try_from(response: &ObservationResponse) -> Result<Self> {
        Ok(Self {
            resource: response.resource.clone(),
            module: response.module.clone(),
            attribute: response.attribute.clone(),
            value: value_to_db_string(&response.value),
            severity: response.severity,
            observed_at: datetime_from_epoch(response.timestamp)?,
        })
    }
}

/// What an observation upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// First sighting of this attribute.
    Inserted,
    /// Same value seen again; only `last_seen` moved.
    Refreshed,
    /// Value differs; a change row was recorded.
    Changed { change_id: i64 },
}

/// Severity assigned by a module to a previously recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeClassification {
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
    pub severity: Severity,
}

impl From<&ChangeResponse> for ChangeClassification {
    fn from(response: &ChangeResponse) -> Self {
        Self {
            resource: response.resource.clone(),
            module: response.module.clone(),
            attribute: response.attribute.clone(),
            old_value: value_to_db_string(&response.old_value),
            new_value: value_to_db_string(&response.new_value),
            severity: response.severity,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Insert the resource or refresh `last_seen` on an existing
    /// `(resource, module)` row. The original `source` is kept.
    async fn upsert_resource(&self, discovery: &Discovery) -> Result<ResourceRecord>;

    /// Insert or update an observation. When the stored value differs, the
    /// row's `last_changed` advances and a change row with severity
    /// `unknown` is recorded in the same write.
    async fn upsert_observation(
        &self,
        observation: &ObservationWrite,
    ) -> Result<ObservationOutcome>;

    /// Apply a module's classification. Only rows still unclassified are
    /// touched; returns whether any row was updated.
    async fn update_change(&self, classification: &ChangeClassification) -> Result<bool>;

    async fn resources(&self) -> Result<Vec<ResourceRecord>>;

    async fn resource(&self, id: i64) -> Result<Option<ResourceRecord>>;

    async fn observations(&self) -> Result<Vec<ObservationRecord>>;

    async fn observation(&self, id: i64) -> Result<Option<ObservationRecord>>;

    async fn changes(&self) -> Result<Vec<ChangeRecord>>;

    async fn change(&self, id: i64) -> Result<Option<ChangeRecord>>;

    /// Changes whose severity is still empty or `unknown`.
    async fn unclassified_changes(&self) -> Result<Vec<ChangeRecord>>;

    /// Case-sensitive substring search across all three tables, 50 rows per
    /// page, 1-based pages.
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage>;
}

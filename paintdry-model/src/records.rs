//! Rows owned by the resource store, as handed out to readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::DiscoveryResponse;
use crate::severity::Severity;

/// A monitored target, unique on `(resource, module)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: i64,
    pub resource: String,
    pub module: String,
    pub source: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Latest value of one attribute, unique on `(resource, module, attribute)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: i64,
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub value: String,
    pub first_seen: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub severity: Severity,
}

/// A detected value transition. `old_value != new_value` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: i64,
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

/// A candidate resource suggested by a worker, not yet committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub resource: String,
    pub module: String,
    pub source: String,
    pub timestamp: i64,
}

impl From<DiscoveryResponse> for Discovery {
    fn from(response: DiscoveryResponse) -> Self {
        Self {
            resource: response.resource,
            module: response.module,
            source: response.source,
            timestamp: response.timestamp,
        }
    }
}

/// A configured `(resource, module)` pair seeded before every pass.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub resource: String,
    pub module: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Resource,
    Observation,
    Change,
}

/// One row of a cross-table search. Table-specific columns are flattened
/// into the object next to the common identity fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub id: i64,
    pub resource: String,
    pub module: String,
    pub attribute: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub page: u32,
    pub per_page: u32,
    pub total_results: u64,
    pub total_pages: u64,
}

impl SearchPage {
    pub const PER_PAGE: u32 = 50;

    pub fn empty(query: impl Into<String>, page: u32) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            page,
            per_page: Self::PER_PAGE,
            total_results: 0,
            total_pages: 0,
        }
    }

    pub fn total_pages_for(total_results: u64) -> u64 {
        total_results.div_ceil(u64::from(Self::PER_PAGE))
    }
}

/// Sequence-numbered marker written when an update pass completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMarker {
    pub seq: u64,
    pub time: String,
    pub name: String,
}

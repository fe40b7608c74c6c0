//! Core data model definitions shared across paintdry crates.
//!
//! The wire protocol spoken between the orchestrator and worker modules lives
//! in [`protocol`]; the rows owned by the resource store live in [`records`].

pub mod error;
pub mod protocol;
pub mod records;
pub mod severity;
pub mod value;

pub use error::{ModelError, Result as ModelResult};
pub use protocol::{
    ChangeRequest, ChangeResponse, DiscoveryRequest, DiscoveryResponse,
    ModuleRequest, ModuleResponse, ObservationRequest, ObservationResponse,
    Operation,
};
pub use records::{
    ChangeRecord, Discovery, ObservationRecord, ResourceRecord, SearchHit,
    SearchKind, SearchPage, SnapshotMarker, Target,
};
pub use severity::Severity;
pub use value::value_to_db_string;

/// Current wall-clock time as integer epoch seconds, the protocol's timestamp unit.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Convert a protocol timestamp into the store's time type.
pub fn datetime_from_epoch(
    timestamp: i64,
) -> ModelResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .ok_or(ModelError::InvalidTimestamp(timestamp))
}

//! Request/response envelopes exchanged with worker modules.
//!
//! Both envelopes are internally tagged by `operation`, so the JSON written to
//! the queue directories is the flat object shape workers expect:
//!
//! ```json
//! {"operation": "discovery", "resource": "example.com", "module": "dns",
//!  "timestamp": 1730241747, "source": "config"}
//! ```
//!
//! Fields required by one operation are plain fields of that variant, so a
//! discovery without `source` or a change without `old_value` fails to decode
//! instead of tripping a runtime assertion later.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::severity::Severity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Discovery,
    Observation,
    Change,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Discovery => write!(f, "discovery"),
            Operation::Observation => write!(f, "observation"),
            Operation::Change => write!(f, "change"),
        }
    }
}

/// Unit of work sent to a worker module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ModuleRequest {
    Discovery(DiscoveryRequest),
    Observation(ObservationRequest),
    Change(ChangeRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub resource: String,
    pub module: String,
    pub timestamp: i64,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub resource: String,
    pub module: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub resource: String,
    pub module: String,
    pub timestamp: i64,
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
}

impl ModuleRequest {
    pub fn discovery(
        resource: impl Into<String>,
        module: impl Into<String>,
        source: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        ModuleRequest::Discovery(DiscoveryRequest {
            resource: resource.into(),
            module: module.into(),
            timestamp,
            source: source.into(),
        })
    }

    pub fn observation(
        resource: impl Into<String>,
        module: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        ModuleRequest::Observation(ObservationRequest {
            resource: resource.into(),
            module: module.into(),
            timestamp,
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            ModuleRequest::Discovery(_) => Operation::Discovery,
            ModuleRequest::Observation(_) => Operation::Observation,
            ModuleRequest::Change(_) => Operation::Change,
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            ModuleRequest::Discovery(req) => &req.resource,
            ModuleRequest::Observation(req) => &req.resource,
            ModuleRequest::Change(req) => &req.resource,
        }
    }

    pub fn module(&self) -> &str {
        match self {
            ModuleRequest::Discovery(req) => &req.module,
            ModuleRequest::Observation(req) => &req.module,
            ModuleRequest::Change(req) => &req.module,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            ModuleRequest::Discovery(req) => req.timestamp,
            ModuleRequest::Observation(req) => req.timestamp,
            ModuleRequest::Change(req) => req.timestamp,
        }
    }

    /// JSON form with the timestamp stripped. Two requests that only differ in
    /// when they were issued share this identity.
    pub fn identity(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("timestamp");
        }
        Ok(value)
    }
}

impl DiscoveryRequest {
    /// Echo the request back as a confirmed discovery owned by the same module.
    pub fn confirm(&self) -> ModuleResponse {
        ModuleResponse::Discovery(DiscoveryResponse {
            resource: self.resource.clone(),
            module: self.module.clone(),
            source: self.source.clone(),
            timestamp: self.timestamp,
        })
    }
}

impl ChangeRequest {
    /// Answer a change request with the severity the module assigns to it.
    pub fn classify(&self, severity: Severity) -> ModuleResponse {
        ModuleResponse::Change(ChangeResponse {
            resource: self.resource.clone(),
            module: self.module.clone(),
            attribute: self.attribute.clone(),
            old_value: Value::String(self.old_value.clone()),
            new_value: Value::String(self.new_value.clone()),
            severity,
            timestamp: self.timestamp,
        })
    }
}

/// Unit of result emitted by a worker module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ModuleResponse {
    Discovery(DiscoveryResponse),
    Observation(ObservationResponse),
    Change(ChangeResponse),
}

/// A resource the module claims exists. `module` may name a different module
/// than the one that produced the response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub resource: String,
    pub module: String,
    pub source: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationResponse {
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub value: Value,
    #[serde(default)]
    pub severity: Severity,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeResponse {
    pub resource: String,
    pub module: String,
    pub attribute: String,
    pub old_value: Value,
    pub new_value: Value,
    pub severity: Severity,
    pub timestamp: i64,
}

impl ModuleResponse {
    pub fn operation(&self) -> Operation {
        match self {
            ModuleResponse::Discovery(_) => Operation::Discovery,
            ModuleResponse::Observation(_) => Operation::Observation,
            ModuleResponse::Change(_) => Operation::Change,
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            ModuleResponse::Discovery(resp) => &resp.resource,
            ModuleResponse::Observation(resp) => &resp.resource,
            ModuleResponse::Change(resp) => &resp.resource,
        }
    }

    pub fn module(&self) -> &str {
        match self {
            ModuleResponse::Discovery(resp) => &resp.module,
            ModuleResponse::Observation(resp) => &resp.module,
            ModuleResponse::Change(resp) => &resp.module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discovery_request_uses_flat_operation_tag() {
        let request = ModuleRequest::discovery("example.com", "dns", "config", 1730241747);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "operation": "discovery",
                "resource": "example.com",
                "module": "dns",
                "timestamp": 1730241747,
                "source": "config",
            })
        );
    }

    #[test]
    fn discovery_without_source_is_rejected() {
        let raw = json!({
            "operation": "discovery",
            "resource": "example.com",
            "module": "dns",
            "timestamp": 1,
        });
        assert!(serde_json::from_value::<ModuleRequest>(raw).is_err());

        let wrong_type = json!({
            "operation": "discovery",
            "resource": "example.com",
            "module": "dns",
            "timestamp": 1,
            "source": 7,
        });
        assert!(serde_json::from_value::<ModuleRequest>(wrong_type).is_err());
    }

    #[test]
    fn observation_request_has_no_source_field() {
        let request = ModuleRequest::observation("example.com", "dns", 5);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("source").is_none());
        assert_eq!(request.operation(), Operation::Observation);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let raw = json!({
            "operation": "teardown",
            "resource": "example.com",
            "module": "dns",
            "timestamp": 1,
        });
        assert!(serde_json::from_value::<ModuleResponse>(raw).is_err());
    }

    #[test]
    fn identity_ignores_timestamp() {
        let a = ModuleRequest::observation("example.com", "dns", 1);
        let b = ModuleRequest::observation("example.com", "dns", 2);
        assert_eq!(a.identity().unwrap(), b.identity().unwrap());
        assert!(a.identity().unwrap().get("timestamp").is_none());
    }

    #[test]
    fn observation_response_accepts_structured_values() {
        let raw = json!({
            "operation": "observation",
            "resource": "example.com",
            "module": "dns",
            "attribute": "ip",
            "value": ["93.184.216.34"],
            "severity": "none",
            "timestamp": 10,
        });
        let response: ModuleResponse = serde_json::from_value(raw).unwrap();
        match response {
            ModuleResponse::Observation(obs) => {
                assert_eq!(obs.value, json!(["93.184.216.34"]));
                assert_eq!(obs.severity, Severity::None);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn classify_echoes_change_identity() {
        let request = ChangeRequest {
            resource: "example.com".into(),
            module: "dns".into(),
            timestamp: 3,
            attribute: "ip".into(),
            old_value: "a".into(),
            new_value: "b".into(),
        };
        let ModuleResponse::Change(change) = request.classify(Severity::Notice) else {
            panic!("expected change response");
        };
        assert_eq!(change.old_value, json!("a"));
        assert_eq!(change.new_value, json!("b"));
        assert_eq!(change.severity, Severity::Notice);
    }
}

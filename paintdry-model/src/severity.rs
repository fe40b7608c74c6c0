use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Alerting priority attached to observations and changes.
///
/// `Unknown` doubles as the "not yet classified" marker: the store writes it
/// for every freshly detected change, and an empty string read back from the
/// store or the wire is treated the same way.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
    Recommendation,
    Notice,
    #[default]
    #[serde(alias = "")]
    Unknown,
}

impl Severity {
    pub const ALL: [Severity; 8] = [
        Severity::None,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
        Severity::Recommendation,
        Severity::Notice,
        Severity::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Recommendation => "recommendation",
            Severity::Notice => "notice",
            Severity::Unknown => "unknown",
        }
    }

    /// True once a module (or a human) has assigned a concrete severity.
    pub fn is_classified(&self) -> bool {
        !matches!(self, Severity::Unknown)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Severity::Unknown);
        }
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ModelError::UnknownSeverity(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_unclassified() {
        assert_eq!("".parse::<Severity>().unwrap(), Severity::Unknown);
        let parsed: Severity = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, Severity::Unknown);
        assert!(!parsed.is_classified());
    }

    #[test]
    fn parses_case_insensitively_and_rejects_garbage() {
        assert_eq!("Critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" notice ".parse::<Severity>().unwrap(), Severity::Notice);
        assert!("catastrophic".parse::<Severity>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Recommendation).unwrap();
        assert_eq!(json, "\"recommendation\"");
        assert!(Severity::High.is_classified());
    }
}

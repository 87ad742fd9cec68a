//! Event domain model and query filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event severity, ordered low < medium < high < critical.
///
/// `rank()` gives the ordering; `Unknown` ranks below every known level so
/// unrecognized severities sort last rather than masquerading as critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    /// Ordering rank; higher is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Unknown => 0,
        }
    }
}

/// An append-only security/telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub org_id: String,
    pub device_id: Option<String>,
    pub event_type: String,
    pub severity: Severity,
    pub source: Option<String>,
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert form for a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub org_id: String,
    pub device_id: Option<String>,
    pub event_type: String,
    pub severity: Severity,
    pub source: Option<String>,
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub tags: Vec<String>,
}

/// Filters for the org-scoped event query. All fields optional; unset
/// fields add no predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilters {
    pub device_id: Option<String>,
    pub event_type: Option<String>,
    pub severity: Option<Severity>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_orders_low_to_critical() {
        assert!(Severity::Low.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Critical.rank());
    }

    #[test]
    fn unknown_severity_ranks_last() {
        assert!(Severity::Unknown.rank() < Severity::Low.rank());
        assert_eq!(Severity::parse("informational"), Severity::Unknown);
    }
}

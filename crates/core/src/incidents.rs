//! Incident domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Mitigated,
    Closed,
    #[serde(other)]
    Unknown,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Mitigated => "mitigated",
            IncidentStatus::Closed => "closed",
            IncidentStatus::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "open" => IncidentStatus::Open,
            "investigating" => IncidentStatus::Investigating,
            "mitigated" => IncidentStatus::Mitigated,
            "closed" => IncidentStatus::Closed,
            _ => IncidentStatus::Unknown,
        }
    }

    /// Open, investigating and mitigated incidents are active; closed and
    /// unknown are not.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            IncidentStatus::Open | IncidentStatus::Investigating | IncidentStatus::Mitigated
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub org_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub assigned_to: Option<String>,
    pub source_event_ids: Vec<String>,
    pub affected_device_ids: Vec<String>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form for a new incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub org_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub assigned_to: Option<String>,
    pub source_event_ids: Vec<String>,
    pub affected_device_ids: Vec<String>,
    pub resolution_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses() {
        assert!(IncidentStatus::Open.is_active());
        assert!(IncidentStatus::Investigating.is_active());
        assert!(IncidentStatus::Mitigated.is_active());
        assert!(!IncidentStatus::Closed.is_active());
        assert!(!IncidentStatus::Unknown.is_active());
    }
}

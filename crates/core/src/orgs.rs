//! Organization (tenant) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription plan. Unrecognized values land in `Unknown` rather than
/// being coerced to a known plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
    #[serde(other)]
    Unknown,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
            Plan::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "free" => Plan::Free,
            "pro" => Plan::Pro,
            "enterprise" => Plan::Enterprise,
            _ => Plan::Unknown,
        }
    }
}

/// The top-level isolation boundary; every other entity belongs to exactly
/// one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub plan: Plan,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form for a new organization (ids and timestamps are assigned by
/// the cloud store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub plan: Plan,
    pub settings: serde_json::Value,
}

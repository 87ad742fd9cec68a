//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Server,
    Workstation,
    Mobile,
    Iot,
    Network,
    Other,
    #[serde(other)]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Server => "server",
            DeviceType::Workstation => "workstation",
            DeviceType::Mobile => "mobile",
            DeviceType::Iot => "iot",
            DeviceType::Network => "network",
            DeviceType::Other => "other",
            DeviceType::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "server" => DeviceType::Server,
            "workstation" => DeviceType::Workstation,
            "mobile" => DeviceType::Mobile,
            "iot" => DeviceType::Iot,
            "network" => DeviceType::Network,
            "other" => DeviceType::Other,
            _ => DeviceType::Unknown,
        }
    }
}

/// Operational status of a device. The set is closed; values this build
/// does not know about parse to `Unknown` instead of being coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Quarantined,
    Offline,
    Maintenance,
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Quarantined => "quarantined",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Maintenance => "maintenance",
            DeviceStatus::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "active" => DeviceStatus::Active,
            "quarantined" => DeviceStatus::Quarantined,
            "offline" => DeviceStatus::Offline,
            "maintenance" => DeviceStatus::Maintenance,
            _ => DeviceStatus::Unknown,
        }
    }
}

/// A monitored endpoint belonging to one organization.
///
/// `location` and `metadata` are opaque structured values; the sync core
/// round-trips them without inspecting their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location: Option<serde_json::Value>,
    pub status: DeviceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form for a new device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub org_id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location: Option<serde_json::Value>,
    pub status: DeviceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

//! Audit log domain models, cloud-side and local (pre-sync).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An audit entry as stored by the cloud store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub org_id: String,
    pub user_id: Option<String>,
    pub api_key_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert form for a cloud audit entry.
///
/// When a `LocalAuditLog` is replayed during the push cycle, the actor
/// fields (`user_id`, `api_key_id`, `ip_address`, `user_agent`) are not
/// known at that layer and are passed as `None`; callers that do know the
/// actor must fill them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditLog {
    pub org_id: String,
    pub user_id: Option<String>,
    pub api_key_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A locally-recorded audit entry awaiting upload. `synced` flips to true
/// only after the corresponding cloud write succeeds; rows are never
/// deleted by the push path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAuditLog {
    pub id: i64,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

impl LocalAuditLog {
    /// Build the cloud insert form for replay. Actor context is unknown at
    /// this layer and left unset.
    pub fn to_cloud(&self, org_id: &str) -> NewAuditLog {
        NewAuditLog {
            org_id: org_id.to_string(),
            user_id: None,
            api_key_id: None,
            action: self.action.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            old_values: self.old_values.clone(),
            new_values: self.new_values.clone(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Insert form for a local audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocalAuditLog {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
}

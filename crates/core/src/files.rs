//! Cloud file metadata. Only metadata rows are modeled here; file content
//! lives with the storage provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub org_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
    pub storage_provider: String,
    pub checksum: Option<String>,
    pub encrypted: bool,
    pub encryption_key_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileRecord {
    pub org_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
    pub storage_provider: String,
    pub checksum: Option<String>,
    pub encrypted: bool,
    pub encryption_key_id: Option<String>,
    pub metadata: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A locally-downloaded copy of a cloud file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub id: i64,
    pub cloud_file_id: String,
    pub local_path: String,
    pub size_bytes: i64,
    pub downloaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

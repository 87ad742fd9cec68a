//! Database rows for sync bookkeeping: per-table cursors, the local audit
//! log and the offline mutation queue.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use odin_core::audit::LocalAuditLog;
use odin_core::sync::{OfflineQueueItem, QueueItemStatus, SyncStatus, SyncTable};
use odin_core::Result;

use crate::db::parse_ts;
use crate::errors::StorageError;

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(primary_key(table_name))]
#[diesel(table_name = crate::schema::sync_status)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncStatusDB {
    pub table_name: String,
    pub last_sync_at: Option<String>,
    pub sync_token: Option<String>,
    pub error_message: Option<String>,
}

impl SyncStatusDB {
    pub fn into_domain(self, table: SyncTable) -> SyncStatus {
        SyncStatus {
            table,
            last_sync_at: self.last_sync_at.as_deref().and_then(parse_ts),
            sync_token: self.sync_token,
            error_message: self.error_message,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::local_audit_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocalAuditLogDB {
    pub id: i64,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub synced: bool,
    pub created_at: String,
}

impl LocalAuditLogDB {
    pub fn into_domain(self) -> Result<LocalAuditLog> {
        let decode = |raw: Option<String>, field: &str| -> Result<Option<serde_json::Value>> {
            raw.map(|value| {
                serde_json::from_str(&value)
                    .map_err(|e| StorageError::Decode(format!("bad {field} JSON: {e}")).into())
            })
            .transpose()
        };

        let created_at = parse_ts(&self.created_at).ok_or_else(|| {
            StorageError::Decode(format!("bad created_at timestamp: {:?}", self.created_at))
        })?;

        Ok(LocalAuditLog {
            id: self.id,
            old_values: decode(self.old_values, "old_values")?,
            new_values: decode(self.new_values, "new_values")?,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            synced: self.synced,
            created_at,
        })
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::local_audit_logs)]
pub struct NewLocalAuditLogDB {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub synced: bool,
    pub created_at: String,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::offline_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OfflineQueueItemDB {
    pub id: i64,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub payload: String,
    pub priority: i32,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub status: String,
    pub created_at: String,
    pub last_retry_at: Option<String>,
}

impl OfflineQueueItemDB {
    pub fn into_domain(self) -> Result<OfflineQueueItem> {
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| StorageError::Decode(format!("bad queue payload JSON: {e}")))?;
        let created_at = parse_ts(&self.created_at).ok_or_else(|| {
            StorageError::Decode(format!("bad created_at timestamp: {:?}", self.created_at))
        })?;

        Ok(OfflineQueueItem {
            id: self.id,
            status: QueueItemStatus::parse(&self.status),
            last_retry_at: self.last_retry_at.as_deref().and_then(parse_ts),
            action: self.action,
            table_name: self.table_name,
            record_id: self.record_id,
            payload,
            priority: self.priority,
            retry_count: self.retry_count,
            last_error: self.last_error,
            created_at,
        })
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::offline_queue)]
pub struct NewOfflineQueueItemDB {
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub payload: String,
    pub priority: i32,
    pub retry_count: i32,
    pub status: String,
    pub created_at: String,
}

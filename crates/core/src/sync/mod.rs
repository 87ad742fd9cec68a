//! Sync domain models: syncable tables, per-table cursors, the offline
//! mutation queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default lookback window for the first event pull, in days.
pub const DEFAULT_EVENT_LOOKBACK_DAYS: i64 = 7;

/// Default page size for event pulls.
pub const DEFAULT_EVENT_BATCH_SIZE: i64 = 1000;

/// Default staleness threshold for `needs_sync`, in minutes.
pub const DEFAULT_MAX_SYNC_AGE_MINUTES: i64 = 5;

/// Default retention window for `cleanup`, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Attempts before an offline queue item is dead-lettered.
pub const MAX_QUEUE_RETRIES: i32 = 5;

/// The closed set of syncable resources. Dispatch is an exhaustive match,
/// so a new table added here fails to compile until every pull/push site
/// handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    Organizations,
    Users,
    Devices,
    Events,
    Incidents,
    Files,
}

/// Default table order for a full organization sync. Order matters:
/// reference data (organizations, users, devices) lands before the rows
/// that point at it.
pub const DEFAULT_SYNC_TABLES: [SyncTable; 6] = [
    SyncTable::Organizations,
    SyncTable::Users,
    SyncTable::Devices,
    SyncTable::Events,
    SyncTable::Incidents,
    SyncTable::Files,
];

impl SyncTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTable::Organizations => "organizations",
            SyncTable::Users => "users",
            SyncTable::Devices => "devices",
            SyncTable::Events => "events",
            SyncTable::Incidents => "incidents",
            SyncTable::Files => "files",
        }
    }

    /// Parse a stored table name. Returns `None` for names outside the
    /// closed set; callers decide whether that is an error or an
    /// unimplemented-operation outcome.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "organizations" => Some(SyncTable::Organizations),
            "users" => Some(SyncTable::Users),
            "devices" => Some(SyncTable::Devices),
            "events" => Some(SyncTable::Events),
            "incidents" => Some(SyncTable::Incidents),
            "files" => Some(SyncTable::Files),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally cached copy of a cloud entity plus its sync stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cached<T> {
    pub entity: T,
    pub last_synced_at: DateTime<Utc>,
}

/// Per-table sync bookkeeping: how far the incremental pull has progressed
/// and what the last attempt reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub table: SyncTable,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_token: Option<String>,
    pub error_message: Option<String>,
}

/// Options for `sync_organization`.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Tables to sync, in order. `None` means `DEFAULT_SYNC_TABLES`.
    pub tables: Option<Vec<SyncTable>>,
    /// Explicit incremental cutoff; overrides the stored cursor.
    pub since: Option<DateTime<Utc>>,
    /// Page size for event pulls; `None` means `DEFAULT_EVENT_BATCH_SIZE`.
    pub batch_size: Option<i64>,
}

/// Mutation kind carried by an offline queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

impl QueueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::Create => "create",
            QueueAction::Update => "update",
            QueueAction::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(QueueAction::Create),
            "update" => Some(QueueAction::Update),
            "delete" => Some(QueueAction::Delete),
            _ => None,
        }
    }
}

/// Lifecycle of a queue item. Items are removed on successful replay;
/// `Dead` items exhausted their retries and are excluded from the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Dead,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Dead => "dead",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "dead" => QueueItemStatus::Dead,
            _ => QueueItemStatus::Pending,
        }
    }
}

/// A locally-originated mutation awaiting upload.
///
/// `action` and `table_name` are kept as raw strings: queue rows are
/// written by collaborating layers outside this core, and an entry naming
/// a table this build does not know must surface as an unimplemented
/// outcome, not a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueueItem {
    pub id: i64,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub status: QueueItemStatus,
    pub created_at: DateTime<Utc>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

/// Insert form for a queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOfflineQueueItem {
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub payload: serde_json::Value,
    pub priority: i32,
}

impl NewOfflineQueueItem {
    /// Typed constructor for mutations originated by this codebase.
    pub fn new(
        action: QueueAction,
        table: SyncTable,
        record_id: Option<String>,
        payload: serde_json::Value,
        priority: i32,
    ) -> Self {
        Self {
            action: action.as_str().to_string(),
            table_name: table.as_str().to_string(),
            record_id,
            payload,
            priority,
        }
    }
}

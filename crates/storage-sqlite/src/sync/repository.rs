//! Repository for sync bookkeeping: per-table cursors, the local audit
//! log and the offline mutation queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::warn;

use odin_core::audit::{LocalAuditLog, NewLocalAuditLog};
use odin_core::sync::{
    NewOfflineQueueItem, OfflineQueueItem, QueueItemStatus, SyncStatus, SyncTable,
};
use odin_core::Result;

use crate::db::{format_ts, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{local_audit_logs, offline_queue, sync_status};

use super::model::{
    LocalAuditLogDB, NewLocalAuditLogDB, NewOfflineQueueItemDB, OfflineQueueItemDB, SyncStatusDB,
};

pub struct SyncStateRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncStateRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    // --- per-table cursors ---

    pub fn get_sync_status(&self, table: SyncTable) -> Result<Option<SyncStatus>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_status::table
            .find(table.as_str())
            .first::<SyncStatusDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.into_domain(table)))
    }

    /// Record a completed pull: advance the cursor and clear any stored
    /// error. Only called after the table's pull finished without error.
    pub async fn mark_sync_success(
        &self,
        table: SyncTable,
        synced_at: DateTime<Utc>,
        sync_token: Option<String>,
    ) -> Result<()> {
        let row = SyncStatusDB {
            table_name: table.as_str().to_string(),
            last_sync_at: Some(format_ts(synced_at)),
            sync_token: sync_token.clone(),
            error_message: None,
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_status::table)
                    .values(&row)
                    .on_conflict(sync_status::table_name)
                    .do_update()
                    .set((
                        sync_status::last_sync_at.eq(row.last_sync_at.clone()),
                        sync_status::sync_token.eq(row.sync_token.clone()),
                        sync_status::error_message.eq::<Option<String>>(None),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Record a failed pull. The stored cursor and token are left exactly
    /// as they were so the next attempt re-covers the failed window.
    pub async fn mark_sync_error(&self, table: SyncTable, message: String) -> Result<()> {
        let table_name = table.as_str().to_string();
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_status::table)
                    .values(SyncStatusDB {
                        table_name: table_name.clone(),
                        last_sync_at: None,
                        sync_token: None,
                        error_message: Some(message.clone()),
                    })
                    .on_conflict(sync_status::table_name)
                    .do_update()
                    .set(sync_status::error_message.eq(Some(message)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    // --- local audit log ---

    pub async fn create_local_audit_log(&self, entry: NewLocalAuditLog) -> Result<LocalAuditLog> {
        let row = NewLocalAuditLogDB {
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            old_values: entry
                .old_values
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            new_values: entry
                .new_values
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            synced: false,
            created_at: format_ts(Utc::now()),
        };

        self.writer
            .exec(move |conn| {
                let inserted = diesel::insert_into(local_audit_logs::table)
                    .values(&row)
                    .returning(LocalAuditLogDB::as_returning())
                    .get_result::<LocalAuditLogDB>(conn)
                    .map_err(StorageError::from)?;
                inserted.into_domain()
            })
            .await
    }

    /// Unsynced audit entries, oldest first.
    pub fn get_unsynced_audit_logs(&self) -> Result<Vec<LocalAuditLog>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = local_audit_logs::table
            .filter(local_audit_logs::synced.eq(false))
            .order(local_audit_logs::created_at.asc())
            .load::<LocalAuditLogDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_domain() {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Skipping undecodable local_audit_logs row: {e}");
                    None
                }
            })
            .collect())
    }

    /// Flip `synced` for a batch of entries. Runs as one writer job, so
    /// the whole batch commits or rolls back together.
    pub async fn mark_audit_logs_synced(&self, ids: Vec<i64>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.writer
            .exec(move |conn| {
                diesel::update(local_audit_logs::table.filter(local_audit_logs::id.eq_any(ids)))
                    .set(local_audit_logs::synced.eq(true))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    // --- offline queue ---

    pub async fn add_to_offline_queue(
        &self,
        item: NewOfflineQueueItem,
    ) -> Result<OfflineQueueItem> {
        let row = NewOfflineQueueItemDB {
            action: item.action,
            table_name: item.table_name,
            record_id: item.record_id,
            payload: serde_json::to_string(&item.payload)?,
            priority: item.priority,
            retry_count: 0,
            status: QueueItemStatus::Pending.as_str().to_string(),
            created_at: format_ts(Utc::now()),
        };

        self.writer
            .exec(move |conn| {
                let inserted = diesel::insert_into(offline_queue::table)
                    .values(&row)
                    .returning(OfflineQueueItemDB::as_returning())
                    .get_result::<OfflineQueueItemDB>(conn)
                    .map_err(StorageError::from)?;
                inserted.into_domain()
            })
            .await
    }

    /// Pending items, highest priority first, oldest first within a
    /// priority. Dead items are excluded.
    pub fn get_offline_queue_items(&self, limit: i64) -> Result<Vec<OfflineQueueItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = offline_queue::table
            .filter(offline_queue::status.eq(QueueItemStatus::Pending.as_str()))
            .order((
                offline_queue::priority.desc(),
                offline_queue::created_at.asc(),
                offline_queue::id.asc(),
            ))
            .limit(limit)
            .load::<OfflineQueueItemDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_domain() {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping undecodable offline_queue row: {e}");
                    None
                }
            })
            .collect())
    }

    /// Items that exhausted their retries.
    pub fn get_dead_queue_items(&self) -> Result<Vec<OfflineQueueItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = offline_queue::table
            .filter(offline_queue::status.eq(QueueItemStatus::Dead.as_str()))
            .order(offline_queue::created_at.asc())
            .load::<OfflineQueueItemDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_domain().ok())
            .collect())
    }

    pub async fn remove_offline_queue_item(&self, id: i64) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::delete(offline_queue::table.find(id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Record a failed replay attempt: bump `retry_count`, stamp the error,
    /// and dead-letter the item once it reaches `max_retries`. Returns the
    /// item's resulting status.
    pub async fn record_queue_failure(
        &self,
        id: i64,
        error: String,
        max_retries: i32,
    ) -> Result<QueueItemStatus> {
        self.writer
            .exec(move |conn| {
                let row = offline_queue::table
                    .find(id)
                    .first::<OfflineQueueItemDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                let Some(row) = row else {
                    // Removed out from under us; nothing to record.
                    return Ok(QueueItemStatus::Pending);
                };

                let attempts = row.retry_count + 1;
                let status = if attempts >= max_retries {
                    QueueItemStatus::Dead
                } else {
                    QueueItemStatus::Pending
                };

                diesel::update(offline_queue::table.find(id))
                    .set((
                        offline_queue::retry_count.eq(attempts),
                        offline_queue::last_error.eq(Some(error)),
                        offline_queue::status.eq(status.as_str()),
                        offline_queue::last_retry_at.eq(Some(format_ts(Utc::now()))),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                Ok(status)
            })
            .await
    }
}

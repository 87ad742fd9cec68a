//! Pull orchestration: cloud → local, one table at a time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use odin_core::events::EventFilters;
use odin_core::sync::{
    SyncOptions, SyncStatus, SyncTable, DEFAULT_EVENT_BATCH_SIZE, DEFAULT_EVENT_LOOKBACK_DAYS,
    DEFAULT_MAX_SYNC_AGE_MINUTES, DEFAULT_RETENTION_DAYS, DEFAULT_SYNC_TABLES,
};
use odin_core::CloudStore;
use odin_storage_sqlite::{CleanupOutcome, LocalDatabase};

use crate::error::{Result, SyncError};
use crate::report::{SyncReport, TableOutcome};
use crate::CancelFlag;

/// Orchestrates pull (cloud → local) and push (local → cloud) cycles.
///
/// Table pulls run strictly sequentially; concurrent syncs of the same
/// organization would race on cursor writes and cache upserts, so callers
/// wanting parallelism must add their own per-org serialization first.
pub struct SyncEngine {
    pub(crate) cloud: Arc<dyn CloudStore>,
    pub(crate) local: Arc<LocalDatabase>,
}

impl SyncEngine {
    pub fn new(cloud: Arc<dyn CloudStore>, local: Arc<LocalDatabase>) -> Self {
        Self { cloud, local }
    }

    /// Pull an organization's data into the local cache.
    ///
    /// Tables sync in the requested (or default) order. A failing table
    /// records its error in the sync status, leaves the stored cursor
    /// untouched and aborts the remaining tables; callers retry the whole
    /// organization to make progress on later tables.
    pub async fn sync_organization(&self, org_id: &str, options: &SyncOptions) -> Result<SyncReport> {
        self.sync_organization_with_cancel(org_id, options, &CancelFlag::default())
            .await
    }

    /// `sync_organization` with a cooperative cancellation flag, checked
    /// before each table pull.
    pub async fn sync_organization_with_cancel(
        &self,
        org_id: &str,
        options: &SyncOptions,
        cancel: &CancelFlag,
    ) -> Result<SyncReport> {
        let tables = options
            .tables
            .clone()
            .unwrap_or_else(|| DEFAULT_SYNC_TABLES.to_vec());

        info!("Starting sync for org {org_id}: {} tables", tables.len());
        let mut report = SyncReport::default();

        for table in tables {
            if cancel.is_cancelled() {
                info!("Sync for org {org_id} cancelled before table {table}");
                return Err(SyncError::Cancelled);
            }

            let stored = self.local.sync.get_sync_status(table)?;
            let since = options.since.or(stored.and_then(|s| s.last_sync_at));
            let started_at = Utc::now();

            match self.pull_table(org_id, table, since, options.batch_size).await {
                Ok(outcome) => {
                    self.local
                        .sync
                        .mark_sync_success(table, started_at, None)
                        .await?;
                    debug!("Synced table {table} for org {org_id}: {outcome:?}");
                    report.tables.push((table, outcome));
                }
                Err(source) => {
                    let message = source.to_string();
                    warn!("Sync failed for table {table} (org {org_id}): {message}");
                    if let Err(status_err) =
                        self.local.sync.mark_sync_error(table, message).await
                    {
                        warn!("Could not record sync error for {table}: {status_err}");
                    }
                    return Err(SyncError::Table { table, source });
                }
            }
        }

        info!(
            "Sync for org {org_id} finished: {} rows cached",
            report.rows_cached()
        );
        Ok(report)
    }

    async fn pull_table(
        &self,
        org_id: &str,
        table: SyncTable,
        since: Option<DateTime<Utc>>,
        batch_size: Option<i64>,
    ) -> odin_core::Result<TableOutcome> {
        match table {
            SyncTable::Organizations => self.pull_organization(org_id).await,
            SyncTable::Users => self.pull_users(org_id).await,
            SyncTable::Devices => self.pull_devices(org_id).await,
            SyncTable::Events => self.pull_events(org_id, since, batch_size).await,
            SyncTable::Incidents => self.pull_incidents(org_id).await,
            SyncTable::Files => {
                // File metadata sync has no pull routine yet; surfaced as a
                // distinct outcome so callers cannot mistake it for data.
                warn!("File metadata sync is not implemented; skipping for org {org_id}");
                Ok(TableOutcome::Unimplemented)
            }
        }
    }

    async fn pull_organization(&self, org_id: &str) -> odin_core::Result<TableOutcome> {
        let mut cached = 0;
        let mut skipped = 0;
        if let Some(org) = self.cloud.get_organization(org_id).await? {
            Self::tally(
                self.local.cache.cache_organization(&org).await,
                &org.id,
                "organization",
                &mut cached,
                &mut skipped,
            )?;
        }
        Ok(TableOutcome::Synced {
            rows_cached: cached,
            rows_skipped: skipped,
        })
    }

    async fn pull_users(&self, org_id: &str) -> odin_core::Result<TableOutcome> {
        let users = self.cloud.get_users_by_org(org_id).await?;
        let mut cached = 0;
        let mut skipped = 0;
        for user in &users {
            Self::tally(
                self.local.cache.cache_user(user).await,
                &user.id,
                "user",
                &mut cached,
                &mut skipped,
            )?;
        }
        Ok(TableOutcome::Synced {
            rows_cached: cached,
            rows_skipped: skipped,
        })
    }

    async fn pull_devices(&self, org_id: &str) -> odin_core::Result<TableOutcome> {
        let devices = self.cloud.get_devices_by_org(org_id, 100, 0).await?;
        let mut cached = 0;
        let mut skipped = 0;
        for device in &devices {
            Self::tally(
                self.local.cache.cache_device(device).await,
                &device.id,
                "device",
                &mut cached,
                &mut skipped,
            )?;
        }
        Ok(TableOutcome::Synced {
            rows_cached: cached,
            rows_skipped: skipped,
        })
    }

    async fn pull_events(
        &self,
        org_id: &str,
        since: Option<DateTime<Utc>>,
        batch_size: Option<i64>,
    ) -> odin_core::Result<TableOutcome> {
        let start_date =
            since.unwrap_or_else(|| Utc::now() - Duration::days(DEFAULT_EVENT_LOOKBACK_DAYS));
        let filters = EventFilters {
            start_date: Some(start_date),
            limit: Some(batch_size.unwrap_or(DEFAULT_EVENT_BATCH_SIZE)),
            ..Default::default()
        };

        let events = self.cloud.get_events_by_org(org_id, &filters).await?;
        let mut cached = 0;
        let mut skipped = 0;
        for event in &events {
            Self::tally(
                self.local.cache.cache_event(event).await,
                &event.id,
                "event",
                &mut cached,
                &mut skipped,
            )?;
        }
        Ok(TableOutcome::Synced {
            rows_cached: cached,
            rows_skipped: skipped,
        })
    }

    async fn pull_incidents(&self, org_id: &str) -> odin_core::Result<TableOutcome> {
        let incidents = self.cloud.get_incidents_by_org(org_id, None).await?;
        let mut cached = 0;
        let mut skipped = 0;
        for incident in &incidents {
            Self::tally(
                self.local.cache.cache_incident(incident).await,
                &incident.id,
                "incident",
                &mut cached,
                &mut skipped,
            )?;
        }
        Ok(TableOutcome::Synced {
            rows_cached: cached,
            rows_skipped: skipped,
        })
    }

    /// Per-row bookkeeping: serialize failures skip the row and keep the
    /// table going; store failures abort the table.
    fn tally(
        result: odin_core::Result<()>,
        row_id: &str,
        kind: &str,
        cached: &mut usize,
        skipped: &mut usize,
    ) -> odin_core::Result<()> {
        match result {
            Ok(()) => {
                *cached += 1;
                Ok(())
            }
            Err(odin_core::Error::Json(e)) => {
                warn!("Skipping {kind} {row_id}: {e}");
                *skipped += 1;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Per-table sync bookkeeping for the default table set; `None` for a
    /// table that has never attempted a sync.
    pub fn get_sync_status(&self) -> Result<HashMap<SyncTable, Option<SyncStatus>>> {
        let mut statuses = HashMap::new();
        for table in DEFAULT_SYNC_TABLES {
            statuses.insert(table, self.local.sync.get_sync_status(table)?);
        }
        Ok(statuses)
    }

    /// True if any tracked table never synced or last synced before the
    /// staleness threshold.
    pub fn needs_sync(&self, org_id: &str, max_age_minutes: Option<i64>) -> Result<bool> {
        let threshold = max_age_minutes.unwrap_or(DEFAULT_MAX_SYNC_AGE_MINUTES);
        let now = Utc::now();

        for (table, status) in self.get_sync_status()? {
            let Some(last_sync_at) = status.and_then(|s| s.last_sync_at) else {
                debug!("Org {org_id} needs sync: table {table} never synced");
                return Ok(true);
            };
            let age_minutes = (now - last_sync_at).num_minutes();
            if age_minutes > threshold {
                debug!("Org {org_id} needs sync: table {table} is {age_minutes} minutes stale");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Drop cached events, local file rows and synced audit logs older
    /// than the retention window.
    pub async fn cleanup(&self, retention_days: Option<i64>) -> Result<CleanupOutcome> {
        let days = retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        Ok(self.local.cleanup_old_data(days).await?)
    }
}

//! On-device SQLite store: cached cloud entities, sessions, settings,
//! local file tracking and sync bookkeeping.
//!
//! Reads go straight through the r2d2 pool; every mutation is funnelled
//! through a single writer actor so multi-statement jobs are atomic and
//! synchronous SQLite calls stay off the async reactor.

pub mod cache;
pub mod db;
pub mod errors;
pub mod local_files;
pub mod schema;
pub mod sessions;
pub mod settings;
pub mod sync;

use std::sync::Arc;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::error;

use odin_core::Result;

pub use db::{create_pool, get_connection, LocalDatabaseConfig, WriteHandle};
pub use errors::StorageError;

use cache::CacheRepository;
use db::format_ts;
use local_files::LocalFileRepository;
use sessions::SessionRepository;
use settings::SettingsRepository;
use sync::SyncStateRepository;

/// Rows removed by one `cleanup_old_data` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub events_deleted: usize,
    pub files_deleted: usize,
    pub audit_logs_deleted: usize,
}

/// The local store facade: owns the pool and writer and exposes one
/// repository per concern.
pub struct LocalDatabase {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    pub cache: CacheRepository,
    pub sync: SyncStateRepository,
    pub sessions: SessionRepository,
    pub settings: SettingsRepository,
    pub files: LocalFileRepository,
}

impl LocalDatabase {
    /// Open (or create) the database file, apply pending migrations and
    /// spawn the writer.
    pub fn open(config: &LocalDatabaseConfig) -> Result<Self> {
        let pool = create_pool(config)?;
        let writer = db::spawn_writer(pool.as_ref().clone());

        Ok(Self {
            cache: CacheRepository::new(pool.clone(), writer.clone()),
            sync: SyncStateRepository::new(pool.clone(), writer.clone()),
            sessions: SessionRepository::new(pool.clone(), writer.clone()),
            settings: SettingsRepository::new(pool.clone(), writer.clone()),
            files: LocalFileRepository::new(pool.clone(), writer.clone()),
            pool,
            writer,
        })
    }

    /// Delete cached events, local file rows and synced audit logs older
    /// than the retention window. Unsynced audit logs are kept regardless
    /// of age; they still carry un-uploaded history.
    pub async fn cleanup_old_data(&self, retention_days: i64) -> Result<CleanupOutcome> {
        use schema::{cached_events, local_audit_logs, local_files};

        let cutoff = format_ts(Utc::now() - Duration::days(retention_days));
        self.writer
            .exec(move |conn| {
                let events_deleted =
                    diesel::delete(cached_events::table.filter(cached_events::created_at.lt(&cutoff)))
                        .execute(conn)
                        .map_err(StorageError::from)?;

                let files_deleted = diesel::delete(
                    local_files::table.filter(local_files::downloaded_at.lt(&cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                let audit_logs_deleted = diesel::delete(
                    local_audit_logs::table
                        .filter(local_audit_logs::created_at.lt(&cutoff))
                        .filter(local_audit_logs::synced.eq(true)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                Ok(CleanupOutcome {
                    events_deleted,
                    files_deleted,
                    audit_logs_deleted,
                })
            })
            .await
    }

    /// Trivial liveness probe; never errors.
    pub fn health_check(&self) -> bool {
        match get_connection(&self.pool) {
            Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn) {
                Ok(_) => true,
                Err(e) => {
                    error!("Local database health check failed: {e}");
                    false
                }
            },
            Err(e) => {
                error!("Local database health check failed: {e}");
                false
            }
        }
    }

    /// Release the pool and stop the writer thread.
    pub fn close(self) {
        drop(self);
    }
}

//! Pool construction, pragmas, migrations and timestamp encoding for the
//! local SQLite store.

pub mod write_actor;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::warn;

use odin_core::Result;

use crate::errors::StorageError;

pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// How long a connection waits on a locked database before erroring.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Configuration for the on-device store. Write-ahead logging and foreign
/// key enforcement both default on.
#[derive(Debug, Clone)]
pub struct LocalDatabaseConfig {
    pub path: PathBuf,
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
    pub pool_size: u32,
}

impl LocalDatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enable_wal: true,
            enable_foreign_keys: true,
            pool_size: 10,
        }
    }

    /// Read the config from process environment variables. Only the path is
    /// required; the pragma flags default on.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("ODIN_LOCAL_DB_PATH")
            .map_err(|_| odin_core::Error::validation("ODIN_LOCAL_DB_PATH is not set"))?;
        let mut config = Self::new(path);
        if let Ok(value) = std::env::var("ODIN_LOCAL_DB_WAL") {
            config.enable_wal = value != "0" && value != "false";
        }
        if let Ok(value) = std::env::var("ODIN_LOCAL_DB_FOREIGN_KEYS") {
            config.enable_foreign_keys = value != "0" && value != "false";
        }
        Ok(config)
    }
}

#[derive(Debug)]
struct ConnectionOptions {
    enable_wal: bool,
    enable_foreign_keys: bool,
}

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        let mut pragmas = String::new();
        if self.enable_wal {
            pragmas.push_str("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        if self.enable_foreign_keys {
            pragmas.push_str("PRAGMA foreign_keys = ON;");
        }
        pragmas.push_str(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"));
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build the connection pool and apply pending migrations.
pub fn create_pool(
    config: &LocalDatabaseConfig,
) -> Result<Arc<Pool<ConnectionManager<SqliteConnection>>>> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                odin_core::Error::connection(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let manager = ConnectionManager::<SqliteConnection>::new(config.path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            enable_wal: config.enable_wal,
            enable_foreign_keys: config.enable_foreign_keys,
        }))
        .build(manager)
        .map_err(|e| odin_core::Error::connection(e.to_string()))?;

    let mut conn = pool.get().map_err(StorageError::from)?;
    run_migrations(&mut conn)?;

    Ok(Arc::new(pool))
}

/// Apply pending embedded migrations.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

/// Check a read connection out of the pool.
pub fn get_connection(
    pool: &Arc<Pool<ConnectionManager<SqliteConnection>>>,
) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>> {
    Ok(pool.get().map_err(StorageError::from)?)
}

/// Encode a timestamp as fixed-width RFC 3339 UTC so TEXT comparisons sort
/// chronologically.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp; logs and returns `None` on malformed input.
pub(crate) fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            warn!("Malformed stored timestamp {value:?}: {e}");
            None
        }
    }
}

//! Tracking of locally-downloaded copies of cloud files.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;

use odin_core::files::LocalFile;
use odin_core::Result;

use crate::db::{format_ts, get_connection, parse_ts, WriteHandle};
use crate::errors::StorageError;
use crate::schema::local_files;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::local_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct LocalFileDB {
    id: i64,
    cloud_file_id: String,
    local_path: String,
    size_bytes: i64,
    downloaded_at: String,
    last_accessed_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::local_files)]
struct NewLocalFileDB {
    cloud_file_id: String,
    local_path: String,
    size_bytes: i64,
    downloaded_at: String,
    last_accessed_at: String,
}

impl LocalFileDB {
    fn into_domain(self) -> Result<LocalFile> {
        let downloaded_at = parse_ts(&self.downloaded_at).ok_or_else(|| {
            StorageError::Decode(format!(
                "bad downloaded_at timestamp: {:?}",
                self.downloaded_at
            ))
        })?;
        let last_accessed_at = parse_ts(&self.last_accessed_at).ok_or_else(|| {
            StorageError::Decode(format!(
                "bad last_accessed_at timestamp: {:?}",
                self.last_accessed_at
            ))
        })?;

        Ok(LocalFile {
            id: self.id,
            cloud_file_id: self.cloud_file_id,
            local_path: self.local_path,
            size_bytes: self.size_bytes,
            downloaded_at,
            last_accessed_at,
        })
    }
}

pub struct LocalFileRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl LocalFileRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    /// Record a downloaded copy; re-downloading the same cloud file
    /// replaces the previous row.
    pub async fn cache_local_file(
        &self,
        cloud_file_id: &str,
        local_path: &str,
        size_bytes: i64,
    ) -> Result<LocalFile> {
        let now = format_ts(Utc::now());
        let row = NewLocalFileDB {
            cloud_file_id: cloud_file_id.to_string(),
            local_path: local_path.to_string(),
            size_bytes,
            downloaded_at: now.clone(),
            last_accessed_at: now,
        };

        self.writer
            .exec(move |conn| {
                let inserted = diesel::insert_into(local_files::table)
                    .values(&row)
                    .on_conflict(local_files::cloud_file_id)
                    .do_update()
                    .set((
                        local_files::local_path.eq(row.local_path.clone()),
                        local_files::size_bytes.eq(row.size_bytes),
                        local_files::downloaded_at.eq(row.downloaded_at.clone()),
                        local_files::last_accessed_at.eq(row.last_accessed_at.clone()),
                    ))
                    .returning(LocalFileDB::as_returning())
                    .get_result::<LocalFileDB>(conn)
                    .map_err(StorageError::from)?;
                inserted.into_domain()
            })
            .await
    }

    pub fn get_local_file_by_cloud_id(&self, cloud_file_id: &str) -> Result<Option<LocalFile>> {
        let mut conn = get_connection(&self.pool)?;
        let row = local_files::table
            .filter(local_files::cloud_file_id.eq(cloud_file_id))
            .first::<LocalFileDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(LocalFileDB::into_domain).transpose()
    }

    /// Stamp a file as just used.
    pub async fn touch_local_file(&self, id: i64) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::update(local_files::table.find(id))
                    .set(local_files::last_accessed_at.eq(format_ts(Utc::now())))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

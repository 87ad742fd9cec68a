//! Key-value store for user preferences.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use odin_core::Result;

use crate::db::{format_ts, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::user_settings;

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(primary_key(key))]
#[diesel(table_name = crate::schema::user_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SettingDB {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: String,
}

pub struct SettingsRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SettingsRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let row = user_settings::table
            .find(key)
            .first::<SettingDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.and_then(|r| r.value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let row = SettingDB {
            key: key.to_string(),
            value: Some(value.to_string()),
            updated_at: format_ts(Utc::now()),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(user_settings::table)
                    .values(&row)
                    .on_conflict(user_settings::key)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    pub fn get_all_settings(&self) -> Result<Vec<SettingDB>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(user_settings::table
            .order(user_settings::key.asc())
            .load::<SettingDB>(&mut conn)
            .map_err(StorageError::from)?)
    }
}

//! Session storage: one access/refresh token pair per (user, org).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use odin_core::Result;

use crate::db::{format_ts, get_connection, parse_ts, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sessions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub user_id: String,
    pub org_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub user_id: String,
    pub org_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::sessions)]
pub struct SessionUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
}

impl SessionUpdate {
    pub fn tokens(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            expires_at: Some(format_ts(expires_at)),
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct SessionDB {
    id: i64,
    user_id: String,
    org_id: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
struct NewSessionDB {
    user_id: String,
    org_id: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionDB {
    fn into_domain(self) -> Result<Session> {
        let created_at = parse_ts(&self.created_at).ok_or_else(|| {
            StorageError::Decode(format!("bad created_at timestamp: {:?}", self.created_at))
        })?;
        let updated_at = parse_ts(&self.updated_at).ok_or_else(|| {
            StorageError::Decode(format!("bad updated_at timestamp: {:?}", self.updated_at))
        })?;

        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            org_id: self.org_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at.as_deref().and_then(parse_ts),
            created_at,
            updated_at,
        })
    }
}

pub struct SessionRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SessionRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    pub async fn create_session(&self, session: NewSession) -> Result<Session> {
        let now = format_ts(Utc::now());
        let row = NewSessionDB {
            user_id: session.user_id,
            org_id: session.org_id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at.map(format_ts),
            created_at: now.clone(),
            updated_at: now,
        };

        self.writer
            .exec(move |conn| {
                let inserted = diesel::insert_into(sessions::table)
                    .values(&row)
                    .returning(SessionDB::as_returning())
                    .get_result::<SessionDB>(conn)
                    .map_err(StorageError::from)?;
                inserted.into_domain()
            })
            .await
    }

    /// The newest unexpired session for a (user, org) pair, if any.
    pub fn get_active_session(&self, user_id: &str, org_id: &str) -> Result<Option<Session>> {
        let mut conn = get_connection(&self.pool)?;
        let now = format_ts(Utc::now());
        let row = sessions::table
            .filter(sessions::user_id.eq(user_id))
            .filter(sessions::org_id.eq(org_id))
            .filter(sessions::expires_at.gt(now))
            .order(sessions::created_at.desc())
            .first::<SessionDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;

        row.map(SessionDB::into_domain).transpose()
    }

    pub async fn update_session(&self, id: i64, update: SessionUpdate) -> Result<Session> {
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(sessions::table.find(id))
                    .set((&update, sessions::updated_at.eq(format_ts(Utc::now()))))
                    .returning(SessionDB::as_returning())
                    .get_result::<SessionDB>(conn)
                    .map_err(StorageError::from)?;
                updated.into_domain()
            })
            .await
    }
}

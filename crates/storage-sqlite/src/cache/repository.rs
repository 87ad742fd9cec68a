//! Repository for the cached cloud entities.
//!
//! Every write is an upsert keyed by the entity id and stamps
//! `last_synced_at`. Rows that fail to decode on read are skipped and
//! logged rather than failing the whole query.

use std::sync::Arc;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::warn;

use odin_core::devices::Device;
use odin_core::events::Event;
use odin_core::incidents::{Incident, IncidentStatus};
use odin_core::orgs::Organization;
use odin_core::sync::Cached;
use odin_core::users::User;
use odin_core::Result;

use crate::db::{format_ts, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{
    cached_devices, cached_events, cached_incidents, cached_organizations, cached_users,
};

use super::model::{
    CachedDeviceDB, CachedEventDB, CachedIncidentDB, CachedOrganizationDB, CachedUserDB,
};

fn keep_decoded<T>(table: &'static str, row: Result<T>) -> Option<T> {
    match row {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping undecodable {table} row: {e}");
            None
        }
    }
}

pub struct CacheRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl CacheRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    pub async fn cache_organization(&self, org: &Organization) -> Result<()> {
        let row = CachedOrganizationDB::from_domain(org, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cached_organizations::table)
                    .values(&row)
                    .on_conflict(cached_organizations::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    pub fn get_cached_organization(&self, org_id: &str) -> Result<Option<Cached<Organization>>> {
        let mut conn = get_connection(&self.pool)?;
        let row = cached_organizations::table
            .find(org_id)
            .first::<CachedOrganizationDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(CachedOrganizationDB::into_domain).transpose()
    }

    pub async fn cache_user(&self, user: &User) -> Result<()> {
        let row = CachedUserDB::from_domain(user, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cached_users::table)
                    .values(&row)
                    .on_conflict(cached_users::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    pub fn get_cached_users_by_org(&self, org_id: &str) -> Result<Vec<Cached<User>>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = cached_users::table
            .filter(cached_users::org_id.eq(org_id))
            .order(cached_users::last_synced_at.desc())
            .load::<CachedUserDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| keep_decoded("cached_users", row.into_domain()))
            .collect())
    }

    pub async fn cache_device(&self, device: &Device) -> Result<()> {
        let row = CachedDeviceDB::from_domain(device, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cached_devices::table)
                    .values(&row)
                    .on_conflict(cached_devices::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    pub fn get_cached_devices_by_org(&self, org_id: &str, limit: i64) -> Result<Vec<Cached<Device>>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = cached_devices::table
            .filter(cached_devices::org_id.eq(org_id))
            .order(cached_devices::last_seen_at.desc())
            .limit(limit)
            .load::<CachedDeviceDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| keep_decoded("cached_devices", row.into_domain()))
            .collect())
    }

    pub async fn cache_event(&self, event: &Event) -> Result<()> {
        let row = CachedEventDB::from_domain(event, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cached_events::table)
                    .values(&row)
                    .on_conflict(cached_events::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Cached events for an org inside the recent day window, newest first.
    pub fn get_recent_events(
        &self,
        org_id: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<Cached<Event>>> {
        let mut conn = get_connection(&self.pool)?;
        let cutoff = format_ts(Utc::now() - Duration::days(days));
        let rows = cached_events::table
            .filter(cached_events::org_id.eq(org_id))
            .filter(cached_events::created_at.ge(cutoff))
            .order(cached_events::created_at.desc())
            .limit(limit)
            .load::<CachedEventDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| keep_decoded("cached_events", row.into_domain()))
            .collect())
    }

    pub async fn cache_incident(&self, incident: &Incident) -> Result<()> {
        let row = CachedIncidentDB::from_domain(incident, Utc::now())?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cached_incidents::table)
                    .values(&row)
                    .on_conflict(cached_incidents::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Open/investigating/mitigated incidents for an org, most severe
    /// first, newest first within a severity.
    pub fn get_active_incidents(&self, org_id: &str) -> Result<Vec<Cached<Incident>>> {
        let mut conn = get_connection(&self.pool)?;
        let active = [
            IncidentStatus::Open.as_str(),
            IncidentStatus::Investigating.as_str(),
            IncidentStatus::Mitigated.as_str(),
        ];
        let rows = cached_incidents::table
            .filter(cached_incidents::org_id.eq(org_id))
            .filter(cached_incidents::status.eq_any(active))
            .load::<CachedIncidentDB>(&mut conn)
            .map_err(StorageError::from)?;

        let mut incidents: Vec<Cached<Incident>> = rows
            .into_iter()
            .filter_map(|row| keep_decoded("cached_incidents", row.into_domain()))
            .collect();

        incidents.sort_by(|a, b| {
            b.entity
                .severity
                .rank()
                .cmp(&a.entity.severity.rank())
                .then(b.entity.created_at.cmp(&a.entity.created_at))
        });

        Ok(incidents)
    }
}

//! PostgreSQL-backed cloud store.
//!
//! Every org-scoped operation runs on its own pooled connection inside a
//! transaction that first sets `app.current_org_id` with a
//! transaction-local `set_config`. Commit and rollback both discard the
//! setting, so tenancy context can never leak between callers sharing the
//! pool.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use odin_core::audit::{AuditLog, NewAuditLog};
use odin_core::devices::{Device, DeviceStatus, NewDevice};
use odin_core::events::{Event, EventFilters, NewEvent};
use odin_core::files::{FileRecord, NewFileRecord};
use odin_core::incidents::{Incident, IncidentStatus, NewIncident};
use odin_core::orgs::{NewOrganization, Organization};
use odin_core::users::{NewUser, User};
use odin_core::{CloudStore, Result};

use crate::error::CloudStoreError;
use crate::rows;

/// Statement that pins the tenancy context for the current transaction.
const SET_ORG_CONTEXT: &str = "SELECT set_config('app.current_org_id', $1, true)";

const DEFAULT_CONNECTION_LIMIT: u32 = 20;
const ACQUIRE_TIMEOUT_SECS: u64 = 5;

const EVENT_COLUMNS: &str = "id, org_id, device_id, event_type, severity, source, message, data, \
                             tags, created_at";

/// Connection settings for the authoritative store. The surrounding
/// application reads these from its environment and passes them in as a
/// plain record.
#[derive(Debug, Clone)]
pub struct CloudDatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl: bool,
    pub connection_limit: u32,
}

impl CloudDatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let require = |name: &str| -> Result<String> {
            std::env::var(name)
                .map_err(|_| odin_core::Error::validation(format!("{name} is not set")))
        };

        Ok(Self {
            host: require("ODIN_CLOUD_DB_HOST")?,
            port: std::env::var("ODIN_CLOUD_DB_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(5432),
            database: require("ODIN_CLOUD_DB_NAME")?,
            username: require("ODIN_CLOUD_DB_USER")?,
            password: require("ODIN_CLOUD_DB_PASSWORD")?,
            ssl: std::env::var("ODIN_CLOUD_DB_SSL")
                .map(|raw| raw != "0" && raw != "false")
                .unwrap_or(false),
            connection_limit: std::env::var("ODIN_CLOUD_DB_POOL")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_CONNECTION_LIMIT),
        })
    }
}

/// Authoritative, org-scoped access to the central PostgreSQL store.
#[derive(Clone)]
pub struct CloudDatabase {
    pool: PgPool,
}

impl CloudDatabase {
    /// Connect and build the pool.
    pub async fn connect(config: &CloudDatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.username)
            .password(&config.password)
            .ssl_mode(if config.ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Disable
            });

        let pool = PgPoolOptions::new()
            .max_connections(config.connection_limit)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(CloudStoreError::Connection)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared setups).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drain the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Begin a transaction with the tenancy context pinned to `org_id`.
    async fn begin_org_tx(&self, org_id: &str) -> Result<Transaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(CloudStoreError::Connection)?;
        sqlx::query(SET_ORG_CONTEXT)
            .bind(org_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CloudStoreError::query("set org context", e))?;
        Ok(tx)
    }

    async fn commit(tx: Transaction<'_, Postgres>) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| CloudStoreError::query("commit", e))?;
        Ok(())
    }

    // --- organizations ---

    pub async fn create_organization(&self, org: NewOrganization) -> Result<Organization> {
        let id = Uuid::new_v4().to_string();
        let row = sqlx::query(
            r#"
            INSERT INTO organizations (id, name, slug, domain, plan, settings, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, name, slug, domain, plan, settings, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&org.name)
        .bind(&org.slug)
        .bind(&org.domain)
        .bind(org.plan.as_str())
        .bind(&org.settings)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CloudStoreError::query("create organization", e))?;

        rows::organization_from_row(&row)
    }

    pub async fn get_organization_impl(&self, org_id: &str) -> Result<Option<Organization>> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let row = sqlx::query(
            "SELECT id, name, slug, domain, plan, settings, created_at, updated_at \
             FROM organizations WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("get organization", e))?;
        Self::commit(tx).await?;

        row.as_ref().map(rows::organization_from_row).transpose()
    }

    /// Partial update; unset fields keep their stored values.
    pub async fn update_organization(
        &self,
        org_id: &str,
        name: Option<String>,
        plan: Option<odin_core::orgs::Plan>,
        settings: Option<serde_json::Value>,
    ) -> Result<Organization> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let row = sqlx::query(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                plan = COALESCE($3, plan),
                settings = COALESCE($4, settings),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, slug, domain, plan, settings, created_at, updated_at
            "#,
        )
        .bind(org_id)
        .bind(&name)
        .bind(plan.map(|p| p.as_str()))
        .bind(&settings)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("update organization", e))?;
        Self::commit(tx).await?;

        rows::organization_from_row(&row)
    }

    // --- users ---

    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&user.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, org_id, email, password_hash, first_name, last_name, role,
                               permissions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING id, org_id, email, first_name, last_name, role, permissions,
                      created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&user.org_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(&user.permissions)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create user", e))?;
        Self::commit(tx).await?;

        rows::user_from_row(&row)
    }

    pub async fn get_user_by_email(&self, org_id: &str, email: &str) -> Result<Option<User>> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let row = sqlx::query(
            "SELECT id, org_id, email, first_name, last_name, role, permissions, created_at, \
             updated_at FROM users WHERE email = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(email)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("get user by email", e))?;
        Self::commit(tx).await?;

        row.as_ref().map(rows::user_from_row).transpose()
    }

    pub async fn get_users_by_org_impl(&self, org_id: &str) -> Result<Vec<User>> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let fetched = sqlx::query(
            "SELECT id, org_id, email, first_name, last_name, role, permissions, created_at, \
             updated_at FROM users WHERE org_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("get users by org", e))?;
        Self::commit(tx).await?;

        fetched.iter().map(rows::user_from_row).collect()
    }

    // --- devices ---

    pub async fn create_device_impl(&self, device: NewDevice) -> Result<Device> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&device.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO devices (id, org_id, name, device_type, os, ip_address, mac_address,
                                 location, status, last_seen_at, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            RETURNING id, org_id, name, device_type, os, ip_address, mac_address, location,
                      status, last_seen_at, metadata, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&device.org_id)
        .bind(&device.name)
        .bind(device.device_type.as_str())
        .bind(&device.os)
        .bind(&device.ip_address)
        .bind(&device.mac_address)
        .bind(&device.location)
        .bind(device.status.as_str())
        .bind(device.last_seen_at)
        .bind(&device.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create device", e))?;
        Self::commit(tx).await?;

        rows::device_from_row(&row)
    }

    pub async fn get_devices_by_org_impl(
        &self,
        org_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Device>> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let fetched = sqlx::query(
            "SELECT id, org_id, name, device_type, os, ip_address, mac_address, location, \
             status, last_seen_at, metadata, created_at, updated_at FROM devices \
             WHERE org_id = $1 AND deleted_at IS NULL ORDER BY last_seen_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("get devices by org", e))?;
        Self::commit(tx).await?;

        fetched.iter().map(rows::device_from_row).collect()
    }

    pub async fn update_device_status(
        &self,
        org_id: &str,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<Device> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let row = sqlx::query(
            r#"
            UPDATE devices SET status = $1, updated_at = NOW()
            WHERE id = $2 AND org_id = $3 AND deleted_at IS NULL
            RETURNING id, org_id, name, device_type, os, ip_address, mac_address, location,
                      status, last_seen_at, metadata, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(device_id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("update device status", e))?;
        Self::commit(tx).await?;

        rows::device_from_row(&row)
    }

    // --- events ---

    pub async fn create_event_impl(&self, event: NewEvent) -> Result<Event> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&event.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO events (id, org_id, device_id, event_type, severity, source, message,
                                data, tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING id, org_id, device_id, event_type, severity, source, message, data, tags,
                      created_at
            "#,
        )
        .bind(&id)
        .bind(&event.org_id)
        .bind(&event.device_id)
        .bind(&event.event_type)
        .bind(event.severity.as_str())
        .bind(&event.source)
        .bind(&event.message)
        .bind(&event.data)
        .bind(&event.tags)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create event", e))?;
        Self::commit(tx).await?;

        rows::event_from_row(&row)
    }

    pub async fn get_events_by_org_impl(
        &self,
        org_id: &str,
        filters: &EventFilters,
    ) -> Result<Vec<Event>> {
        let sql = build_events_query(filters);
        let mut tx = self.begin_org_tx(org_id).await?;

        let mut query = sqlx::query(&sql).bind(org_id);
        if let Some(device_id) = &filters.device_id {
            query = query.bind(device_id);
        }
        if let Some(event_type) = &filters.event_type {
            query = query.bind(event_type);
        }
        if let Some(severity) = filters.severity {
            query = query.bind(severity.as_str());
        }
        if let Some(start_date) = filters.start_date {
            query = query.bind(start_date);
        }
        if let Some(end_date) = filters.end_date {
            query = query.bind(end_date);
        }
        if let Some(limit) = filters.limit {
            query = query.bind(limit);
        }
        if let Some(offset) = filters.offset {
            query = query.bind(offset);
        }

        let fetched = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| CloudStoreError::query("get events by org", e))?;
        Self::commit(tx).await?;

        fetched.iter().map(rows::event_from_row).collect()
    }

    // --- incidents ---

    pub async fn create_incident_impl(&self, incident: NewIncident) -> Result<Incident> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&incident.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO incidents (id, org_id, title, description, severity, status, assigned_to,
                                   source_event_ids, affected_device_ids, resolution_notes,
                                   created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            RETURNING id, org_id, title, description, severity, status, assigned_to,
                      source_event_ids, affected_device_ids, resolution_notes, resolved_at,
                      created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&incident.org_id)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_str())
        .bind(incident.status.as_str())
        .bind(&incident.assigned_to)
        .bind(&incident.source_event_ids)
        .bind(&incident.affected_device_ids)
        .bind(&incident.resolution_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create incident", e))?;
        Self::commit(tx).await?;

        rows::incident_from_row(&row)
    }

    pub async fn get_incidents_by_org_impl(
        &self,
        org_id: &str,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>> {
        let mut tx = self.begin_org_tx(org_id).await?;
        let base = "SELECT id, org_id, title, description, severity, status, assigned_to, \
                    source_event_ids, affected_device_ids, resolution_notes, resolved_at, \
                    created_at, updated_at FROM incidents WHERE org_id = $1";
        let sql = match status {
            Some(_) => format!("{base} AND status = $2 ORDER BY created_at DESC"),
            None => format!("{base} ORDER BY created_at DESC"),
        };
        let mut query = sqlx::query(&sql).bind(org_id);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let fetched = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| CloudStoreError::query("get incidents by org", e))?;
        Self::commit(tx).await?;

        fetched.iter().map(rows::incident_from_row).collect()
    }

    // --- files ---

    pub async fn create_file_impl(&self, file: NewFileRecord) -> Result<FileRecord> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&file.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO files (id, org_id, filename, content_type, size_bytes, storage_path,
                               storage_provider, checksum, encrypted, encryption_key_id,
                               metadata, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            RETURNING id, org_id, filename, content_type, size_bytes, storage_path,
                      storage_provider, checksum, encrypted, encryption_key_id, metadata,
                      created_at, expires_at
            "#,
        )
        .bind(&id)
        .bind(&file.org_id)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(file.size_bytes)
        .bind(&file.storage_path)
        .bind(&file.storage_provider)
        .bind(&file.checksum)
        .bind(file.encrypted)
        .bind(&file.encryption_key_id)
        .bind(&file.metadata)
        .bind(file.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create file", e))?;
        Self::commit(tx).await?;

        rows::file_from_row(&row)
    }

    // --- audit logs ---

    pub async fn create_audit_log_impl(&self, entry: NewAuditLog) -> Result<AuditLog> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.begin_org_tx(&entry.org_id).await?;
        let row = sqlx::query(
            r#"
            INSERT INTO audit_logs (id, org_id, user_id, api_key_id, action, resource_type,
                                    resource_id, old_values, new_values, ip_address, user_agent,
                                    created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            RETURNING id, org_id, user_id, api_key_id, action, resource_type, resource_id,
                      old_values, new_values, ip_address, user_agent, created_at
            "#,
        )
        .bind(&id)
        .bind(&entry.org_id)
        .bind(&entry.user_id)
        .bind(&entry.api_key_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CloudStoreError::query("create audit log", e))?;
        Self::commit(tx).await?;

        rows::audit_log_from_row(&row)
    }

    /// Trivial liveness probe; never errors.
    pub async fn health_check_impl(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                debug!("Cloud database health check ok");
                true
            }
            Err(e) => {
                error!("Cloud database health check failed: {e}");
                false
            }
        }
    }
}

/// Build the filtered event query. Placeholders are numbered in filter
/// declaration order; callers bind in the same order.
fn build_events_query(filters: &EventFilters) -> String {
    let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE org_id = $1");
    let mut param = 1;

    if filters.device_id.is_some() {
        param += 1;
        sql.push_str(&format!(" AND device_id = ${param}"));
    }
    if filters.event_type.is_some() {
        param += 1;
        sql.push_str(&format!(" AND event_type = ${param}"));
    }
    if filters.severity.is_some() {
        param += 1;
        sql.push_str(&format!(" AND severity = ${param}"));
    }
    if filters.start_date.is_some() {
        param += 1;
        sql.push_str(&format!(" AND created_at >= ${param}"));
    }
    if filters.end_date.is_some() {
        param += 1;
        sql.push_str(&format!(" AND created_at <= ${param}"));
    }

    sql.push_str(" ORDER BY created_at DESC");

    if filters.limit.is_some() {
        param += 1;
        sql.push_str(&format!(" LIMIT ${param}"));
    }
    if filters.offset.is_some() {
        param += 1;
        sql.push_str(&format!(" OFFSET ${param}"));
    }

    sql
}

#[async_trait]
impl CloudStore for CloudDatabase {
    async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>> {
        self.get_organization_impl(org_id).await
    }

    async fn get_users_by_org(&self, org_id: &str) -> Result<Vec<User>> {
        self.get_users_by_org_impl(org_id).await
    }

    async fn get_devices_by_org(
        &self,
        org_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Device>> {
        self.get_devices_by_org_impl(org_id, limit, offset).await
    }

    async fn get_events_by_org(&self, org_id: &str, filters: &EventFilters) -> Result<Vec<Event>> {
        self.get_events_by_org_impl(org_id, filters).await
    }

    async fn get_incidents_by_org(
        &self,
        org_id: &str,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>> {
        self.get_incidents_by_org_impl(org_id, status).await
    }

    async fn create_device(&self, device: NewDevice) -> Result<Device> {
        self.create_device_impl(device).await
    }

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident> {
        self.create_incident_impl(incident).await
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event> {
        self.create_event_impl(event).await
    }

    async fn create_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog> {
        self.create_audit_log_impl(entry).await
    }

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        self.create_file_impl(file).await
    }

    async fn health_check(&self) -> bool {
        self.health_check_impl().await
    }
}

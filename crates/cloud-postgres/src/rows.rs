//! Row-to-domain mappers for the cloud store.

use sqlx::postgres::PgRow;
use sqlx::Row;

use odin_core::audit::AuditLog;
use odin_core::devices::{Device, DeviceStatus, DeviceType};
use odin_core::events::{Event, Severity};
use odin_core::files::FileRecord;
use odin_core::incidents::{Incident, IncidentStatus};
use odin_core::orgs::{Organization, Plan};
use odin_core::users::{User, UserRole};
use odin_core::{Error, Result};

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| Error::query(format!("decode column {name}"), e))
}

pub fn organization_from_row(row: &PgRow) -> Result<Organization> {
    let plan: String = col(row, "plan")?;
    Ok(Organization {
        id: col(row, "id")?,
        name: col(row, "name")?,
        slug: col(row, "slug")?,
        domain: col(row, "domain")?,
        plan: Plan::parse(&plan),
        settings: col(row, "settings")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

pub fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = col(row, "role")?;
    Ok(User {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        email: col(row, "email")?,
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        role: UserRole::parse(&role),
        permissions: col(row, "permissions")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

pub fn device_from_row(row: &PgRow) -> Result<Device> {
    let device_type: String = col(row, "device_type")?;
    let status: String = col(row, "status")?;
    Ok(Device {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        name: col(row, "name")?,
        device_type: DeviceType::parse(&device_type),
        os: col(row, "os")?,
        ip_address: col(row, "ip_address")?,
        mac_address: col(row, "mac_address")?,
        location: col(row, "location")?,
        status: DeviceStatus::parse(&status),
        last_seen_at: col(row, "last_seen_at")?,
        metadata: col(row, "metadata")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

pub fn event_from_row(row: &PgRow) -> Result<Event> {
    let severity: String = col(row, "severity")?;
    Ok(Event {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        device_id: col(row, "device_id")?,
        event_type: col(row, "event_type")?,
        severity: Severity::parse(&severity),
        source: col(row, "source")?,
        message: col(row, "message")?,
        data: col(row, "data")?,
        tags: col(row, "tags")?,
        created_at: col(row, "created_at")?,
    })
}

pub fn incident_from_row(row: &PgRow) -> Result<Incident> {
    let severity: String = col(row, "severity")?;
    let status: String = col(row, "status")?;
    Ok(Incident {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        title: col(row, "title")?,
        description: col(row, "description")?,
        severity: Severity::parse(&severity),
        status: IncidentStatus::parse(&status),
        assigned_to: col(row, "assigned_to")?,
        source_event_ids: col(row, "source_event_ids")?,
        affected_device_ids: col(row, "affected_device_ids")?,
        resolution_notes: col(row, "resolution_notes")?,
        resolved_at: col(row, "resolved_at")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

pub fn file_from_row(row: &PgRow) -> Result<FileRecord> {
    Ok(FileRecord {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        filename: col(row, "filename")?,
        content_type: col(row, "content_type")?,
        size_bytes: col(row, "size_bytes")?,
        storage_path: col(row, "storage_path")?,
        storage_provider: col(row, "storage_provider")?,
        checksum: col(row, "checksum")?,
        encrypted: col(row, "encrypted")?,
        encryption_key_id: col(row, "encryption_key_id")?,
        metadata: col(row, "metadata")?,
        created_at: col(row, "created_at")?,
        expires_at: col(row, "expires_at")?,
    })
}

pub fn audit_log_from_row(row: &PgRow) -> Result<AuditLog> {
    Ok(AuditLog {
        id: col(row, "id")?,
        org_id: col(row, "org_id")?,
        user_id: col(row, "user_id")?,
        api_key_id: col(row, "api_key_id")?,
        action: col(row, "action")?,
        resource_type: col(row, "resource_type")?,
        resource_id: col(row, "resource_id")?,
        old_values: col(row, "old_values")?,
        new_values: col(row, "new_values")?,
        ip_address: col(row, "ip_address")?,
        user_agent: col(row, "user_agent")?,
        created_at: col(row, "created_at")?,
    })
}

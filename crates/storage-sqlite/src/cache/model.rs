//! Database rows for the cached cloud entities.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use odin_core::devices::{Device, DeviceStatus, DeviceType};
use odin_core::events::{Event, Severity};
use odin_core::incidents::{Incident, IncidentStatus};
use odin_core::orgs::{Organization, Plan};
use odin_core::sync::Cached;
use odin_core::users::{User, UserRole};
use odin_core::Result;

use crate::db::{format_ts, parse_ts};
use crate::errors::StorageError;

fn required_ts(value: &str, field: &str) -> Result<DateTime<Utc>> {
    parse_ts(value)
        .ok_or_else(|| StorageError::Decode(format!("bad {field} timestamp: {value:?}")).into())
}

fn decode_json(value: &str, field: &str) -> Result<serde_json::Value> {
    serde_json::from_str(value)
        .map_err(|e| StorageError::Decode(format!("bad {field} JSON: {e}")).into())
}

fn decode_string_list(value: &str, field: &str) -> Result<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|e| StorageError::Decode(format!("bad {field} JSON: {e}")).into())
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::cached_organizations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CachedOrganizationDB {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub plan: String,
    pub settings: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: String,
}

impl CachedOrganizationDB {
    pub fn from_domain(org: &Organization, synced_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: org.id.clone(),
            name: org.name.clone(),
            slug: org.slug.clone(),
            domain: org.domain.clone(),
            plan: org.plan.as_str().to_string(),
            settings: serde_json::to_string(&org.settings)?,
            created_at: format_ts(org.created_at),
            updated_at: format_ts(org.updated_at),
            last_synced_at: format_ts(synced_at),
        })
    }

    pub fn into_domain(self) -> Result<Cached<Organization>> {
        Ok(Cached {
            entity: Organization {
                plan: Plan::parse(&self.plan),
                settings: decode_json(&self.settings, "settings")?,
                created_at: required_ts(&self.created_at, "created_at")?,
                updated_at: required_ts(&self.updated_at, "updated_at")?,
                id: self.id,
                name: self.name,
                slug: self.slug,
                domain: self.domain,
            },
            last_synced_at: required_ts(&self.last_synced_at, "last_synced_at")?,
        })
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::cached_users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CachedUserDB {
    pub id: String,
    pub org_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub permissions: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: String,
}

impl CachedUserDB {
    pub fn from_domain(user: &User, synced_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: user.id.clone(),
            org_id: user.org_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.as_str().to_string(),
            permissions: serde_json::to_string(&user.permissions)?,
            created_at: format_ts(user.created_at),
            updated_at: format_ts(user.updated_at),
            last_synced_at: format_ts(synced_at),
        })
    }

    pub fn into_domain(self) -> Result<Cached<User>> {
        Ok(Cached {
            entity: User {
                role: UserRole::parse(&self.role),
                permissions: decode_json(&self.permissions, "permissions")?,
                created_at: required_ts(&self.created_at, "created_at")?,
                updated_at: required_ts(&self.updated_at, "updated_at")?,
                id: self.id,
                org_id: self.org_id,
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
            },
            last_synced_at: required_ts(&self.last_synced_at, "last_synced_at")?,
        })
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::cached_devices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CachedDeviceDB {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub device_type: String,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub last_seen_at: Option<String>,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: String,
}

impl CachedDeviceDB {
    pub fn from_domain(device: &Device, synced_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: device.id.clone(),
            org_id: device.org_id.clone(),
            name: device.name.clone(),
            device_type: device.device_type.as_str().to_string(),
            os: device.os.clone(),
            ip_address: device.ip_address.clone(),
            mac_address: device.mac_address.clone(),
            location: device
                .location
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            status: device.status.as_str().to_string(),
            last_seen_at: device.last_seen_at.map(format_ts),
            metadata: serde_json::to_string(&device.metadata)?,
            created_at: format_ts(device.created_at),
            updated_at: format_ts(device.updated_at),
            last_synced_at: format_ts(synced_at),
        })
    }

    pub fn into_domain(self) -> Result<Cached<Device>> {
        Ok(Cached {
            entity: Device {
                device_type: DeviceType::parse(&self.device_type),
                status: DeviceStatus::parse(&self.status),
                location: self
                    .location
                    .as_deref()
                    .map(|raw| decode_json(raw, "location"))
                    .transpose()?,
                metadata: decode_json(&self.metadata, "metadata")?,
                last_seen_at: self.last_seen_at.as_deref().and_then(parse_ts),
                created_at: required_ts(&self.created_at, "created_at")?,
                updated_at: required_ts(&self.updated_at, "updated_at")?,
                id: self.id,
                org_id: self.org_id,
                name: self.name,
                os: self.os,
                ip_address: self.ip_address,
                mac_address: self.mac_address,
            },
            last_synced_at: required_ts(&self.last_synced_at, "last_synced_at")?,
        })
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::cached_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CachedEventDB {
    pub id: String,
    pub org_id: String,
    pub device_id: Option<String>,
    pub event_type: String,
    pub severity: String,
    pub source: Option<String>,
    pub message: Option<String>,
    pub data: String,
    pub tags: String,
    pub created_at: String,
    pub last_synced_at: String,
}

impl CachedEventDB {
    pub fn from_domain(event: &Event, synced_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: event.id.clone(),
            org_id: event.org_id.clone(),
            device_id: event.device_id.clone(),
            event_type: event.event_type.clone(),
            severity: event.severity.as_str().to_string(),
            source: event.source.clone(),
            message: event.message.clone(),
            data: serde_json::to_string(&event.data)?,
            tags: serde_json::to_string(&event.tags)?,
            created_at: format_ts(event.created_at),
            last_synced_at: format_ts(synced_at),
        })
    }

    pub fn into_domain(self) -> Result<Cached<Event>> {
        Ok(Cached {
            entity: Event {
                severity: Severity::parse(&self.severity),
                data: decode_json(&self.data, "data")?,
                tags: decode_string_list(&self.tags, "tags")?,
                created_at: required_ts(&self.created_at, "created_at")?,
                id: self.id,
                org_id: self.org_id,
                device_id: self.device_id,
                event_type: self.event_type,
                source: self.source,
                message: self.message,
            },
            last_synced_at: required_ts(&self.last_synced_at, "last_synced_at")?,
        })
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::cached_incidents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CachedIncidentDB {
    pub id: String,
    pub org_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    pub assigned_to: Option<String>,
    pub source_event_ids: String,
    pub affected_device_ids: String,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: String,
}

impl CachedIncidentDB {
    pub fn from_domain(incident: &Incident, synced_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: incident.id.clone(),
            org_id: incident.org_id.clone(),
            title: incident.title.clone(),
            description: incident.description.clone(),
            severity: incident.severity.as_str().to_string(),
            status: incident.status.as_str().to_string(),
            assigned_to: incident.assigned_to.clone(),
            source_event_ids: serde_json::to_string(&incident.source_event_ids)?,
            affected_device_ids: serde_json::to_string(&incident.affected_device_ids)?,
            resolution_notes: incident.resolution_notes.clone(),
            resolved_at: incident.resolved_at.map(format_ts),
            created_at: format_ts(incident.created_at),
            updated_at: format_ts(incident.updated_at),
            last_synced_at: format_ts(synced_at),
        })
    }

    pub fn into_domain(self) -> Result<Cached<Incident>> {
        Ok(Cached {
            entity: Incident {
                severity: Severity::parse(&self.severity),
                status: IncidentStatus::parse(&self.status),
                source_event_ids: decode_string_list(&self.source_event_ids, "source_event_ids")?,
                affected_device_ids: decode_string_list(
                    &self.affected_device_ids,
                    "affected_device_ids",
                )?,
                resolved_at: self.resolved_at.as_deref().and_then(parse_ts),
                created_at: required_ts(&self.created_at, "created_at")?,
                updated_at: required_ts(&self.updated_at, "updated_at")?,
                id: self.id,
                org_id: self.org_id,
                title: self.title,
                description: self.description,
                assigned_to: self.assigned_to,
                resolution_notes: self.resolution_notes,
            },
            last_synced_at: required_ts(&self.last_synced_at, "last_synced_at")?,
        })
    }
}

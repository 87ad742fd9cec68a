//! In-memory cloud store with failure injection for engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use odin_core::audit::{AuditLog, NewAuditLog};
use odin_core::devices::{Device, DeviceStatus, DeviceType, NewDevice};
use odin_core::events::{Event, EventFilters, NewEvent, Severity};
use odin_core::files::{FileRecord, NewFileRecord};
use odin_core::incidents::{Incident, IncidentStatus, NewIncident};
use odin_core::orgs::{Organization, Plan};
use odin_core::users::{User, UserRole};
use odin_core::{CloudStore, Error, Result};

#[derive(Default)]
pub struct MockCloud {
    pub organization: Mutex<Option<Organization>>,
    pub users: Mutex<Vec<User>>,
    pub devices: Mutex<Vec<Device>>,
    pub events: Mutex<Vec<Event>>,
    pub incidents: Mutex<Vec<Incident>>,
    pub audit_logs: Mutex<Vec<AuditLog>>,
    pub created_devices: Mutex<Vec<NewDevice>>,
    pub created_incidents: Mutex<Vec<NewIncident>>,
    pub last_event_filters: Mutex<Option<EventFilters>>,
    fail_ops: Mutex<HashSet<&'static str>>,
    counter: AtomicUsize,
}

impl MockCloud {
    pub fn fail(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().remove(op);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.fail_ops.lock().unwrap().contains(op) {
            Err(Error::connection(format!("injected failure: {op}")))
        } else {
            Ok(())
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl CloudStore for MockCloud {
    async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>> {
        self.check("get_organization")?;
        Ok(self
            .organization
            .lock()
            .unwrap()
            .clone()
            .filter(|org| org.id == org_id))
    }

    async fn get_users_by_org(&self, org_id: &str) -> Result<Vec<User>> {
        self.check("get_users_by_org")?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn get_devices_by_org(
        &self,
        org_id: &str,
        limit: i64,
        _offset: i64,
    ) -> Result<Vec<Device>> {
        self.check("get_devices_by_org")?;
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.org_id == org_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_events_by_org(&self, org_id: &str, filters: &EventFilters) -> Result<Vec<Event>> {
        self.check("get_events_by_org")?;
        *self.last_event_filters.lock().unwrap() = Some(filters.clone());
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| filters.start_date.map_or(true, |start| e.created_at >= start))
            .take(filters.limit.unwrap_or(i64::MAX) as usize)
            .cloned()
            .collect())
    }

    async fn get_incidents_by_org(
        &self,
        org_id: &str,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>> {
        self.check("get_incidents_by_org")?;
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.org_id == org_id)
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }

    async fn create_device(&self, device: NewDevice) -> Result<Device> {
        self.check("create_device")?;
        let now = Utc::now();
        let created = Device {
            id: self.next_id("dev"),
            org_id: device.org_id.clone(),
            name: device.name.clone(),
            device_type: device.device_type,
            os: device.os.clone(),
            ip_address: device.ip_address.clone(),
            mac_address: device.mac_address.clone(),
            location: device.location.clone(),
            status: device.status,
            last_seen_at: device.last_seen_at,
            metadata: device.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        self.created_devices.lock().unwrap().push(device);
        self.devices.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident> {
        self.check("create_incident")?;
        let now = Utc::now();
        let created = Incident {
            id: self.next_id("inc"),
            org_id: incident.org_id.clone(),
            title: incident.title.clone(),
            description: incident.description.clone(),
            severity: incident.severity,
            status: incident.status,
            assigned_to: incident.assigned_to.clone(),
            source_event_ids: incident.source_event_ids.clone(),
            affected_device_ids: incident.affected_device_ids.clone(),
            resolution_notes: incident.resolution_notes.clone(),
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.created_incidents.lock().unwrap().push(incident);
        self.incidents.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event> {
        self.check("create_event")?;
        let created = Event {
            id: self.next_id("ev"),
            org_id: event.org_id,
            device_id: event.device_id,
            event_type: event.event_type,
            severity: event.severity,
            source: event.source,
            message: event.message,
            data: event.data,
            tags: event.tags,
            created_at: Utc::now(),
        };
        self.events.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog> {
        self.check("create_audit_log")?;
        let created = AuditLog {
            id: self.next_id("audit"),
            org_id: entry.org_id,
            user_id: entry.user_id,
            api_key_id: entry.api_key_id,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            old_values: entry.old_values,
            new_values: entry.new_values,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        };
        self.audit_logs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        self.check("create_file")?;
        Ok(FileRecord {
            id: self.next_id("file"),
            org_id: file.org_id,
            filename: file.filename,
            content_type: file.content_type,
            size_bytes: file.size_bytes,
            storage_path: file.storage_path,
            storage_provider: file.storage_provider,
            checksum: file.checksum,
            encrypted: file.encrypted,
            encryption_key_id: file.encryption_key_id,
            metadata: file.metadata,
            created_at: Utc::now(),
            expires_at: file.expires_at,
        })
    }

    async fn health_check(&self) -> bool {
        self.check("health_check").is_ok()
    }
}

// --- fixture builders ---

pub fn organization(id: &str) -> Organization {
    let now = Utc::now();
    Organization {
        id: id.to_string(),
        name: format!("org {id}"),
        slug: id.to_string(),
        domain: None,
        plan: Plan::Pro,
        settings: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

pub fn user(id: &str, org_id: &str) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        org_id: org_id.to_string(),
        email: format!("{id}@example.com"),
        first_name: None,
        last_name: None,
        role: UserRole::User,
        permissions: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

pub fn device(id: &str, org_id: &str) -> Device {
    let now = Utc::now();
    Device {
        id: id.to_string(),
        org_id: org_id.to_string(),
        name: format!("device {id}"),
        device_type: DeviceType::Server,
        os: Some("linux".to_string()),
        ip_address: None,
        mac_address: None,
        location: None,
        status: DeviceStatus::Active,
        last_seen_at: Some(now),
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

pub fn new_device(name: &str, org_id: &str) -> NewDevice {
    NewDevice {
        org_id: org_id.to_string(),
        name: name.to_string(),
        device_type: DeviceType::Workstation,
        os: None,
        ip_address: None,
        mac_address: None,
        location: None,
        status: DeviceStatus::Active,
        last_seen_at: None,
        metadata: serde_json::json!({}),
    }
}

pub fn event(id: &str, org_id: &str) -> Event {
    Event {
        id: id.to_string(),
        org_id: org_id.to_string(),
        device_id: None,
        event_type: "port_scan".to_string(),
        severity: Severity::High,
        source: Some("ids".to_string()),
        message: None,
        data: serde_json::json!({}),
        tags: vec![],
        created_at: Utc::now(),
    }
}

pub fn incident(id: &str, org_id: &str) -> Incident {
    let now = Utc::now();
    Incident {
        id: id.to_string(),
        org_id: org_id.to_string(),
        title: format!("incident {id}"),
        description: None,
        severity: Severity::Critical,
        status: IncidentStatus::Open,
        assigned_to: None,
        source_event_ids: vec![],
        affected_device_ids: vec![],
        resolution_notes: None,
        resolved_at: None,
        created_at: now,
        updated_at: now,
    }
}

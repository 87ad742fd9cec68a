//! Cloud store contract.
//!
//! The org id is an explicit parameter on every scoped call; there is no
//! ambient tenancy context to set or clear, so two callers sharing one
//! store can never observe each other's org.

use async_trait::async_trait;

use crate::audit::{AuditLog, NewAuditLog};
use crate::devices::{Device, NewDevice};
use crate::errors::Result;
use crate::events::{Event, EventFilters, NewEvent};
use crate::files::{FileRecord, NewFileRecord};
use crate::incidents::{Incident, IncidentStatus, NewIncident};
use crate::orgs::Organization;
use crate::users::User;

/// Authoritative, org-scoped access to the relational source of truth.
///
/// Query errors propagate to the caller; implementations do not retry.
#[async_trait]
pub trait CloudStore: Send + Sync {
    async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>>;

    async fn get_users_by_org(&self, org_id: &str) -> Result<Vec<User>>;

    async fn get_devices_by_org(&self, org_id: &str, limit: i64, offset: i64)
        -> Result<Vec<Device>>;

    async fn get_events_by_org(&self, org_id: &str, filters: &EventFilters) -> Result<Vec<Event>>;

    async fn get_incidents_by_org(
        &self,
        org_id: &str,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>>;

    async fn create_device(&self, device: NewDevice) -> Result<Device>;

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident>;

    async fn create_event(&self, event: NewEvent) -> Result<Event>;

    async fn create_audit_log(&self, entry: NewAuditLog) -> Result<AuditLog>;

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord>;

    /// Trivial liveness probe. Never errors; failures are logged by the
    /// implementation and reported as `false`.
    async fn health_check(&self) -> bool;
}

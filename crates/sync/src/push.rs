//! Push cycle: replay locally-recorded changes against the cloud store.
//!
//! Unlike the pull cycle, per-item failures here are contained: the loop
//! logs, records the failure and moves on to the next item.

use log::{info, warn};

use odin_core::devices::NewDevice;
use odin_core::incidents::NewIncident;
use odin_core::sync::{
    OfflineQueueItem, QueueAction, QueueItemStatus, SyncTable, MAX_QUEUE_RETRIES,
};

use crate::engine::SyncEngine;
use crate::error::Result;
use crate::report::PushReport;

/// Queue items drained per push cycle.
const QUEUE_DRAIN_LIMIT: i64 = 100;

/// What happened to a single queue item's replay.
enum ItemOutcome {
    Replayed,
    /// The action/table pair has no cloud handler. The item stays queued
    /// on the normal bounded-retry path.
    Unimplemented(String),
}

impl SyncEngine {
    /// Upload unsynced audit logs, then drain the offline queue.
    ///
    /// The two phases are independent; there is no ordering guarantee
    /// between an audit-derived write and a queue-derived write to the
    /// same resource.
    pub async fn upload_offline_changes(&self, org_id: &str) -> Result<PushReport> {
        let mut report = PushReport::default();

        // Phase one: audit log replay. Actor context (user, API key, IP,
        // user agent) is not known at this layer; the cloud rows carry
        // NULLs until the surrounding application supplies it.
        let unsynced = self.local.sync.get_unsynced_audit_logs()?;
        let mut replayed_ids = Vec::with_capacity(unsynced.len());
        for log in &unsynced {
            let entry = log.to_cloud(org_id);
            match self.cloud.create_audit_log(entry).await {
                Ok(_) => replayed_ids.push(log.id),
                Err(e) => {
                    warn!("Audit log {} replay failed: {e}", log.id);
                    report.audit_logs_failed += 1;
                }
            }
        }
        report.audit_logs_uploaded = replayed_ids.len();
        self.local.sync.mark_audit_logs_synced(replayed_ids).await?;

        // Phase two: offline queue drain, best effort per item.
        let items = self.local.sync.get_offline_queue_items(QUEUE_DRAIN_LIMIT)?;
        for item in items {
            match self.replay_queue_item(org_id, &item).await {
                Ok(ItemOutcome::Replayed) => {
                    self.local.sync.remove_offline_queue_item(item.id).await?;
                    report.items_uploaded += 1;
                }
                Ok(ItemOutcome::Unimplemented(reason)) => {
                    warn!("Offline queue item {}: {reason}", item.id);
                    report.items_unimplemented += 1;
                    let status = self
                        .local
                        .sync
                        .record_queue_failure(item.id, reason, MAX_QUEUE_RETRIES)
                        .await?;
                    if status == QueueItemStatus::Dead {
                        report.items_dead_lettered += 1;
                    }
                }
                Err(e) => {
                    warn!("Offline queue item {} replay failed: {e}", item.id);
                    report.items_failed += 1;
                    let status = self
                        .local
                        .sync
                        .record_queue_failure(item.id, e.to_string(), MAX_QUEUE_RETRIES)
                        .await?;
                    if status == QueueItemStatus::Dead {
                        report.items_dead_lettered += 1;
                    }
                }
            }
        }

        info!(
            "Push for org {org_id}: {} audit logs, {} queue items uploaded",
            report.audit_logs_uploaded, report.items_uploaded
        );
        Ok(report)
    }

    async fn replay_queue_item(
        &self,
        org_id: &str,
        item: &OfflineQueueItem,
    ) -> odin_core::Result<ItemOutcome> {
        let Some(action) = QueueAction::parse(&item.action) else {
            return Ok(ItemOutcome::Unimplemented(format!(
                "unknown action '{}'",
                item.action
            )));
        };

        match action {
            QueueAction::Create => self.replay_create(org_id, item).await,
            // Updates and deletes have no generic cloud handler yet; they
            // must be visible as unimplemented, never as silent success.
            QueueAction::Update => Ok(ItemOutcome::Unimplemented(format!(
                "update not implemented for table '{}'",
                item.table_name
            ))),
            QueueAction::Delete => Ok(ItemOutcome::Unimplemented(format!(
                "delete not implemented for table '{}'",
                item.table_name
            ))),
        }
    }

    async fn replay_create(
        &self,
        org_id: &str,
        item: &OfflineQueueItem,
    ) -> odin_core::Result<ItemOutcome> {
        let Some(table) = SyncTable::parse(&item.table_name) else {
            return Ok(ItemOutcome::Unimplemented(format!(
                "create not implemented for table '{}'",
                item.table_name
            )));
        };

        match table {
            SyncTable::Devices => {
                let mut device: NewDevice = serde_json::from_value(item.payload.clone())?;
                // The queue payload was written offline; the org of record
                // is the one being pushed.
                device.org_id = org_id.to_string();
                self.cloud.create_device(device).await?;
                Ok(ItemOutcome::Replayed)
            }
            SyncTable::Incidents => {
                let mut incident: NewIncident = serde_json::from_value(item.payload.clone())?;
                incident.org_id = org_id.to_string();
                self.cloud.create_incident(incident).await?;
                Ok(ItemOutcome::Replayed)
            }
            SyncTable::Organizations
            | SyncTable::Users
            | SyncTable::Events
            | SyncTable::Files => Ok(ItemOutcome::Unimplemented(format!(
                "create not implemented for table '{}'",
                item.table_name
            ))),
        }
    }
}

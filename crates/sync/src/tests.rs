//! Engine tests against the in-memory cloud store and a throwaway SQLite
//! file.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::tempdir;

use odin_core::audit::NewLocalAuditLog;
use odin_core::sync::{
    NewOfflineQueueItem, QueueAction, SyncOptions, SyncTable, MAX_QUEUE_RETRIES,
};
use odin_storage_sqlite::{LocalDatabase, LocalDatabaseConfig};

use crate::test_support::{self, MockCloud};
use crate::{CancelFlag, SyncEngine, SyncError, TableOutcome};

const ORG: &str = "org_1";

fn setup() -> (Arc<MockCloud>, Arc<LocalDatabase>, SyncEngine) {
    let dir = tempdir().expect("tempdir").keep();
    let config = LocalDatabaseConfig::new(dir.join("local.db"));
    let local = Arc::new(LocalDatabase::open(&config).expect("open local db"));
    let cloud = Arc::new(MockCloud::default());
    let engine = SyncEngine::new(cloud.clone(), local.clone());
    (cloud, local, engine)
}

fn options_for(tables: &[SyncTable]) -> SyncOptions {
    SyncOptions {
        tables: Some(tables.to_vec()),
        ..Default::default()
    }
}

#[tokio::test]
async fn syncing_devices_caches_rows_and_sets_cursor() {
    let (cloud, local, engine) = setup();
    for id in ["dev-1", "dev-2", "dev-3"] {
        cloud
            .devices
            .lock()
            .unwrap()
            .push(test_support::device(id, ORG));
    }

    let report = engine
        .sync_organization(ORG, &options_for(&[SyncTable::Devices]))
        .await
        .expect("sync");

    assert_eq!(
        report.outcome_for(SyncTable::Devices),
        Some(TableOutcome::Synced {
            rows_cached: 3,
            rows_skipped: 0
        })
    );

    let cached = local
        .cache
        .get_cached_devices_by_org(ORG, 100)
        .expect("read cache");
    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|d| d.entity.org_id == ORG));

    let status = local
        .sync
        .get_sync_status(SyncTable::Devices)
        .expect("status")
        .expect("row");
    assert!(status.last_sync_at.is_some());
    assert!(status.error_message.is_none());
}

#[tokio::test]
async fn resyncing_identical_data_is_idempotent() {
    let (cloud, local, engine) = setup();
    cloud
        .devices
        .lock()
        .unwrap()
        .push(test_support::device("dev-1", ORG));

    let options = options_for(&[SyncTable::Devices]);
    engine.sync_organization(ORG, &options).await.expect("first");
    engine
        .sync_organization(ORG, &options)
        .await
        .expect("second");

    let cached = local
        .cache
        .get_cached_devices_by_org(ORG, 100)
        .expect("read cache");
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn failing_table_aborts_the_rest_of_the_sequence() {
    let (cloud, local, engine) = setup();
    cloud
        .devices
        .lock()
        .unwrap()
        .push(test_support::device("dev-1", ORG));
    cloud.fail("get_users_by_org");

    let err = engine
        .sync_organization(ORG, &options_for(&[SyncTable::Users, SyncTable::Devices]))
        .await
        .expect_err("users pull must fail");
    match err {
        SyncError::Table { table, .. } => assert_eq!(table, SyncTable::Users),
        other => panic!("unexpected error: {other}"),
    }

    let users_status = local
        .sync
        .get_sync_status(SyncTable::Users)
        .expect("status")
        .expect("row");
    assert!(users_status.error_message.is_some());
    assert!(users_status.last_sync_at.is_none());

    // Devices was never attempted.
    assert!(local
        .sync
        .get_sync_status(SyncTable::Devices)
        .expect("status")
        .is_none());
    assert!(local
        .cache
        .get_cached_devices_by_org(ORG, 100)
        .expect("read cache")
        .is_empty());
}

#[tokio::test]
async fn failed_pull_keeps_the_previous_cursor() {
    let (cloud, local, engine) = setup();
    let options = options_for(&[SyncTable::Devices]);

    engine
        .sync_organization(ORG, &options)
        .await
        .expect("first sync");
    let cursor_before = local
        .sync
        .get_sync_status(SyncTable::Devices)
        .expect("status")
        .expect("row")
        .last_sync_at
        .expect("cursor");

    cloud.fail("get_devices_by_org");
    engine
        .sync_organization(ORG, &options)
        .await
        .expect_err("second sync must fail");

    let status = local
        .sync
        .get_sync_status(SyncTable::Devices)
        .expect("status")
        .expect("row");
    assert_eq!(
        status.last_sync_at.map(|t| t.timestamp_millis()),
        Some(cursor_before.timestamp_millis())
    );
    assert!(status.error_message.is_some());
}

#[tokio::test]
async fn event_pull_defaults_to_week_window_and_batch_size() {
    let (cloud, _local, engine) = setup();

    engine
        .sync_organization(ORG, &options_for(&[SyncTable::Events]))
        .await
        .expect("sync");

    let filters = cloud
        .last_event_filters
        .lock()
        .unwrap()
        .clone()
        .expect("filters recorded");
    assert_eq!(filters.limit, Some(1000));
    let start = filters.start_date.expect("start date");
    let expected = Utc::now() - Duration::days(7);
    assert!((start - expected).num_minutes().abs() < 1);
}

#[tokio::test]
async fn explicit_since_and_batch_size_override_defaults() {
    let (cloud, _local, engine) = setup();
    let since = Utc::now() - Duration::hours(2);

    let options = SyncOptions {
        tables: Some(vec![SyncTable::Events]),
        since: Some(since),
        batch_size: Some(50),
    };
    engine.sync_organization(ORG, &options).await.expect("sync");

    let filters = cloud
        .last_event_filters
        .lock()
        .unwrap()
        .clone()
        .expect("filters recorded");
    assert_eq!(filters.limit, Some(50));
    assert_eq!(filters.start_date, Some(since));
}

#[tokio::test]
async fn stored_cursor_feeds_the_next_event_window() {
    let (cloud, local, engine) = setup();
    let cursor = Utc::now() - Duration::minutes(30);
    local
        .sync
        .mark_sync_success(SyncTable::Events, cursor, None)
        .await
        .expect("seed cursor");

    engine
        .sync_organization(ORG, &options_for(&[SyncTable::Events]))
        .await
        .expect("sync");

    let filters = cloud
        .last_event_filters
        .lock()
        .unwrap()
        .clone()
        .expect("filters recorded");
    assert_eq!(
        filters.start_date.map(|t| t.timestamp_millis()),
        Some(cursor.timestamp_millis())
    );
}

#[tokio::test]
async fn files_pull_is_surfaced_as_unimplemented() {
    let (_cloud, _local, engine) = setup();

    let report = engine
        .sync_organization(ORG, &options_for(&[SyncTable::Files]))
        .await
        .expect("sync");

    assert_eq!(
        report.outcome_for(SyncTable::Files),
        Some(TableOutcome::Unimplemented)
    );
}

#[tokio::test]
async fn cancelled_sync_stops_before_pulling() {
    let (cloud, local, engine) = setup();
    cloud
        .devices
        .lock()
        .unwrap()
        .push(test_support::device("dev-1", ORG));

    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = engine
        .sync_organization_with_cancel(ORG, &options_for(&[SyncTable::Devices]), &cancel)
        .await
        .expect_err("must cancel");
    assert!(matches!(err, SyncError::Cancelled));

    assert!(local
        .cache
        .get_cached_devices_by_org(ORG, 100)
        .expect("read cache")
        .is_empty());
}

#[tokio::test]
async fn needs_sync_tracks_staleness_per_table() {
    let (_cloud, local, engine) = setup();

    // Nothing has ever synced.
    assert!(engine.needs_sync(ORG, Some(5)).expect("needs_sync"));

    let now = Utc::now();
    for table in odin_core::sync::DEFAULT_SYNC_TABLES {
        local
            .sync
            .mark_sync_success(table, now, None)
            .await
            .expect("seed status");
    }
    assert!(!engine.needs_sync(ORG, Some(5)).expect("needs_sync"));

    local
        .sync
        .mark_sync_success(SyncTable::Events, now - Duration::minutes(10), None)
        .await
        .expect("age events");
    assert!(engine.needs_sync(ORG, Some(5)).expect("needs_sync"));
    assert!(!engine.needs_sync(ORG, Some(15)).expect("needs_sync"));
}

#[tokio::test]
async fn push_replays_audit_logs_without_guessing_the_actor() {
    let (cloud, local, engine) = setup();
    for i in 0..2 {
        local
            .sync
            .create_local_audit_log(NewLocalAuditLog {
                action: format!("device.update.{i}"),
                resource_type: "devices".to_string(),
                resource_id: Some(format!("dev-{i}")),
                old_values: None,
                new_values: Some(serde_json::json!({ "status": "offline" })),
            })
            .await
            .expect("create audit log");
    }

    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.audit_logs_uploaded, 2);
    assert_eq!(report.audit_logs_failed, 0);

    let uploaded = cloud.audit_logs.lock().unwrap().clone();
    assert_eq!(uploaded.len(), 2);
    for log in &uploaded {
        assert_eq!(log.org_id, ORG);
        assert!(log.user_id.is_none());
        assert!(log.ip_address.is_none());
        assert!(log.user_agent.is_none());
    }

    assert!(local
        .sync
        .get_unsynced_audit_logs()
        .expect("read")
        .is_empty());

    // A second push has nothing left to upload.
    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.audit_logs_uploaded, 0);
}

#[tokio::test]
async fn failed_audit_replay_keeps_logs_unsynced() {
    let (cloud, local, engine) = setup();
    local
        .sync
        .create_local_audit_log(NewLocalAuditLog {
            action: "device.update".to_string(),
            resource_type: "devices".to_string(),
            resource_id: None,
            old_values: None,
            new_values: None,
        })
        .await
        .expect("create audit log");
    cloud.fail("create_audit_log");

    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.audit_logs_uploaded, 0);
    assert_eq!(report.audit_logs_failed, 1);
    assert_eq!(local.sync.get_unsynced_audit_logs().expect("read").len(), 1);

    // The log survives for the next push once the cloud recovers.
    cloud.recover("create_audit_log");
    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.audit_logs_uploaded, 1);
}

#[tokio::test]
async fn queue_drain_removes_replayed_items_and_keeps_unrecognized_ones() {
    let (cloud, local, engine) = setup();

    local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem::new(
            QueueAction::Create,
            SyncTable::Devices,
            None,
            serde_json::to_value(test_support::new_device("laptop", "offline-org")).expect("json"),
            0,
        ))
        .await
        .expect("enqueue device");

    local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem {
            action: "create".to_string(),
            table_name: "widgets".to_string(),
            record_id: None,
            payload: serde_json::json!({}),
            priority: 0,
        })
        .await
        .expect("enqueue widgets");

    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.items_uploaded, 1);
    assert_eq!(report.items_unimplemented, 1);
    assert_eq!(report.items_failed, 0);

    // The device landed in the cloud under the pushed org, not the org id
    // baked into the offline payload.
    let created = cloud.created_devices.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].org_id, ORG);

    // The widgets item stays queued with one recorded attempt.
    let remaining = local.sync.get_offline_queue_items(100).expect("read queue");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].table_name, "widgets");
    assert_eq!(remaining[0].retry_count, 1);
}

#[tokio::test]
async fn failed_replay_leaves_the_item_queued_with_its_id() {
    let (cloud, local, engine) = setup();
    cloud.fail("create_device");

    let item = local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem::new(
            QueueAction::Create,
            SyncTable::Devices,
            None,
            serde_json::to_value(test_support::new_device("laptop", ORG)).expect("json"),
            0,
        ))
        .await
        .expect("enqueue");

    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.items_failed, 1);
    assert_eq!(report.items_uploaded, 0);

    let remaining = local.sync.get_offline_queue_items(100).expect("read queue");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, item.id);
    assert_eq!(remaining[0].retry_count, 1);
    assert!(remaining[0].last_error.is_some());
}

#[tokio::test]
async fn repeatedly_failing_item_is_dead_lettered() {
    let (cloud, local, engine) = setup();
    cloud.fail("create_device");

    local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem::new(
            QueueAction::Create,
            SyncTable::Devices,
            None,
            serde_json::to_value(test_support::new_device("laptop", ORG)).expect("json"),
            0,
        ))
        .await
        .expect("enqueue");

    let mut dead_lettered = 0;
    for _ in 0..MAX_QUEUE_RETRIES {
        let report = engine.upload_offline_changes(ORG).await.expect("push");
        dead_lettered += report.items_dead_lettered;
    }
    assert_eq!(dead_lettered, 1);

    assert!(local
        .sync
        .get_offline_queue_items(100)
        .expect("read queue")
        .is_empty());
    let dead = local.sync.get_dead_queue_items().expect("read dead");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].retry_count, MAX_QUEUE_RETRIES);

    // Dead items are not retried on later pushes.
    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.items_failed, 0);
}

#[tokio::test]
async fn update_and_delete_actions_surface_as_unimplemented() {
    let (_cloud, local, engine) = setup();
    local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem::new(
            QueueAction::Update,
            SyncTable::Devices,
            Some("dev-1".to_string()),
            serde_json::json!({ "status": "offline" }),
            0,
        ))
        .await
        .expect("enqueue update");
    local
        .sync
        .add_to_offline_queue(NewOfflineQueueItem::new(
            QueueAction::Delete,
            SyncTable::Incidents,
            Some("inc-1".to_string()),
            serde_json::json!({}),
            0,
        ))
        .await
        .expect("enqueue delete");

    let report = engine.upload_offline_changes(ORG).await.expect("push");
    assert_eq!(report.items_unimplemented, 2);
    assert_eq!(report.items_uploaded, 0);
    assert_eq!(local.sync.get_offline_queue_items(100).expect("read").len(), 2);
}

#[tokio::test]
async fn full_default_sync_covers_every_table() {
    let (cloud, local, engine) = setup();
    *cloud.organization.lock().unwrap() = Some(test_support::organization(ORG));
    cloud.users.lock().unwrap().push(test_support::user("user-1", ORG));
    cloud
        .devices
        .lock()
        .unwrap()
        .push(test_support::device("dev-1", ORG));
    cloud.events.lock().unwrap().push(test_support::event("ev-1", ORG));
    cloud
        .incidents
        .lock()
        .unwrap()
        .push(test_support::incident("inc-1", ORG));

    let report = engine
        .sync_organization(ORG, &SyncOptions::default())
        .await
        .expect("sync");

    assert_eq!(report.tables.len(), 6);
    assert_eq!(report.rows_cached(), 5);
    assert_eq!(
        report.outcome_for(SyncTable::Files),
        Some(TableOutcome::Unimplemented)
    );

    assert!(local
        .cache
        .get_cached_organization(ORG)
        .expect("org")
        .is_some());
    assert_eq!(local.cache.get_cached_users_by_org(ORG).expect("users").len(), 1);
    assert_eq!(local.cache.get_recent_events(ORG, 7, 1000).expect("events").len(), 1);
    assert_eq!(local.cache.get_active_incidents(ORG).expect("incidents").len(), 1);
    assert!(!engine.needs_sync(ORG, Some(5)).expect("needs_sync"));
}

#[tokio::test]
async fn get_sync_status_reports_every_default_table() {
    let (_cloud, _local, engine) = setup();
    let statuses = engine.get_sync_status().expect("statuses");
    assert_eq!(statuses.len(), 6);
    assert!(statuses.values().all(|status| status.is_none()));
}

#[tokio::test]
async fn cleanup_delegates_to_the_local_store() {
    let (_cloud, local, engine) = setup();
    local
        .sync
        .create_local_audit_log(NewLocalAuditLog {
            action: "noop".to_string(),
            resource_type: "devices".to_string(),
            resource_id: None,
            old_values: None,
            new_values: None,
        })
        .await
        .expect("create");

    let outcome = engine.cleanup(Some(30)).await.expect("cleanup");
    // Nothing is old enough to delete; the unsynced log survives.
    assert_eq!(outcome.audit_logs_deleted, 0);
    assert_eq!(local.sync.get_unsynced_audit_logs().expect("read").len(), 1);
}

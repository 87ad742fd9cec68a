//! SQLite storage for sync bookkeeping (cursors, audit log, offline queue).

pub mod model;
pub mod repository;

pub use model::{LocalAuditLogDB, OfflineQueueItemDB, SyncStatusDB};
pub use repository::SyncStateRepository;

//! Typed outcomes for pull and push cycles.
//!
//! Unimplemented operations get their own variants so a caller can tell a
//! skipped table or queue item apart from a successful one.

use serde::Serialize;

use odin_core::sync::SyncTable;

/// Outcome of one table's pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TableOutcome {
    /// Rows were fetched and cached. `rows_skipped` counts rows dropped by
    /// per-row serialize failures.
    Synced {
        rows_cached: usize,
        rows_skipped: usize,
    },
    /// The pull for this table is a documented no-op.
    Unimplemented,
}

/// Result of `sync_organization`: per-table outcomes in pull order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub tables: Vec<(SyncTable, TableOutcome)>,
}

impl SyncReport {
    pub fn rows_cached(&self) -> usize {
        self.tables
            .iter()
            .map(|(_, outcome)| match outcome {
                TableOutcome::Synced { rows_cached, .. } => *rows_cached,
                TableOutcome::Unimplemented => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, table: SyncTable) -> Option<TableOutcome> {
        self.tables
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, outcome)| *outcome)
    }
}

/// Result of `upload_offline_changes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub audit_logs_uploaded: usize,
    pub audit_logs_failed: usize,
    pub items_uploaded: usize,
    pub items_failed: usize,
    pub items_unimplemented: usize,
    pub items_dead_lettered: usize,
}

//! Error types for the sync engine.

use odin_core::sync::SyncTable;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A table pull failed. Tables after this one in the requested order
    /// were not attempted.
    #[error("Sync failed for table {table}: {source}")]
    Table {
        table: SyncTable,
        source: odin_core::Error,
    },

    /// The caller cancelled the sync between table pulls.
    #[error("Sync cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] odin_core::Error),
}

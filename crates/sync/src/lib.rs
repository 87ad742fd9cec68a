//! Organization data synchronization engine.
//!
//! Pull cycles copy org-scoped rows from the cloud store into the local
//! cache with per-table cursors; push cycles replay locally-recorded
//! audit logs and queued mutations back to the cloud.

pub mod engine;
pub mod error;
pub mod push;
pub mod report;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use report::{PushReport, SyncReport, TableOutcome};

/// Cooperative cancellation flag, checked between table pulls.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

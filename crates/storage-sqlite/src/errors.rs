//! Storage error types and conversion into the core taxonomy.

use odin_core::{DatabaseError, Error};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("SQLite query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Pool(e) => Error::Database(DatabaseError::Connection(e.to_string())),
            other => Error::Database(DatabaseError::Internal(other.to_string())),
        }
    }
}

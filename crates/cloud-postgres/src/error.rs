//! Error types for the cloud store crate.

use odin_core::{DatabaseError, Error};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CloudStoreError {
    /// The pool could not hand out a connection or begin a transaction.
    #[error("Connection failure: {0}")]
    Connection(sqlx::Error),

    /// A statement failed after the connection was established.
    #[error("Query failed ({operation}): {source}")]
    Query {
        operation: &'static str,
        source: sqlx::Error,
    },
}

impl CloudStoreError {
    pub fn query(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Query { operation, source }
    }
}

impl From<CloudStoreError> for Error {
    fn from(err: CloudStoreError) -> Self {
        match err {
            CloudStoreError::Connection(e) => {
                Error::Database(DatabaseError::Connection(e.to_string()))
            }
            CloudStoreError::Query { operation, source } => Error::Database(DatabaseError::Query {
                operation: operation.to_string(),
                message: source.to_string(),
            }),
        }
    }
}

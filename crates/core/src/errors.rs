//! Shared error taxonomy for the Odin sync core.

use thiserror::Error;

/// Result type alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Database-layer failures, cloud or local.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A connection could not be established or acquired from the pool.
    #[error("Connection failure: {0}")]
    Connection(String),

    /// A query failed after the connection was established.
    #[error("Query failed ({operation}): {message}")]
    Query { operation: String, message: String },

    /// Anything else the backend reported.
    #[error("Database error: {0}")]
    Internal(String),
}

/// Errors surfaced by the sync core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// JSON encode/decode failure for an opaque structured field.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller handed us something malformed (unknown table name, bad id).
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Connectivity-class database error.
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Database(DatabaseError::Connection(message.into()))
    }

    /// Query-class database error with the failing operation named.
    pub fn query(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Database(DatabaseError::Query {
            operation: operation.into(),
            message: message.to_string(),
        })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_names_the_operation() {
        let err = Error::query("get organization", "relation does not exist");
        assert_eq!(
            err.to_string(),
            "Query failed (get organization): relation does not exist"
        );
    }
}

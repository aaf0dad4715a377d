//! Error types for the graph store.

use thiserror::Error;

/// Errors from graph-store operations.
///
/// `Connection` is the one fatal class — commands abort on it. Everything
/// else is reported to the caller, which decides whether to degrade.
/// Duplicate-key writes never surface here at all: upserts and
/// `INSERT IGNORE` absorb them.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is unreachable or refused the session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A query failed to execute or returned an engine error.
    #[error("Query error: {0}")]
    Query(String),

    /// Schema definition failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A payload could not be converted to or from store values.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// Result type for graph-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

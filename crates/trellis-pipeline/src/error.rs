//! Error types for pipeline orchestration.

use thiserror::Error;
use trellis_surrealdb::StoreError;

/// Errors that abort an index run.
///
/// Per-unit failures (unreadable files, parse degradations, skipped model
/// batches) never surface here — they accumulate into the run summary.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The graph store failed; connection failures are fatal to the run.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The corpus root is missing or not a directory.
    #[error("Invalid corpus root: {0}")]
    InvalidRoot(String),

    /// IO failure outside the per-unit recovery path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

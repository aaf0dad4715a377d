//! Error types for the synchronizer.

use thiserror::Error;

/// Errors from watching and synchronization.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The OS watch backend failed.
    #[error("File watching error: {0}")]
    Watch(String),

    /// Event delivery failed.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A unit processor reported a failure.
    #[error("Processing error for {path}: {message}")]
    Processor { path: String, message: String },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        WatchError::Watch(err.to_string())
    }
}

/// Result type for synchronizer operations.
pub type WatchResult<T> = std::result::Result<T, WatchError>;

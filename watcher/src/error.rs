//! Error types for the watch service.

use thiserror::Error;

/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur in the watch service.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Watch root does not exist.
    #[error("watch root not found: {0}")]
    RootNotFound(String),

    /// Watch root exists but is not a directory.
    #[error("watch root is not a directory: {0}")]
    NotADirectory(String),

    /// Service or watcher started twice.
    #[error("already running")]
    AlreadyRunning,

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP delivery error.
    #[error("delivery error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

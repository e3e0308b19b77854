//! Error types for clawscope-core
//!
//! Most readers in this crate never return these: malformed input and missing
//! files degrade to empty results. `Error` is reserved for configuration,
//! journal persistence, watcher start-up and cross-thread hand-off failures.

use thiserror::Error;

/// Main error type for the clawscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem notification backend error
    #[error("file watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Hand-off from the watcher thread to the event loop failed
    #[error("hand-off error: {0}")]
    Handoff(String),

    /// Task history journal could not be written
    #[error("history journal error at {path}: {message}")]
    Journal { path: String, message: String },
}

/// Result type alias for clawscope-core
pub type Result<T> = std::result::Result<T, Error>;

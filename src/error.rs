//! Error types, one enum per failure domain.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or running an event stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// Task id or base URL rejected before connecting
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Transport failed after it was established
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend thread or runtime could not be started
    #[error("Stream runtime error: {0}")]
    Runtime(String),
}

/// Errors raised while exporting or loading a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or saving settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to determine configuration directory")]
    NoConfigDir,

    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by [`crate::state::MessageStore::begin`]
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The configured fixture could not be replayed
    #[error("Failed to load fixture: {0}")]
    Fixture(#[from] SnapshotError),
}

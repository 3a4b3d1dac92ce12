//! Error types and Result aliases for findex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using findex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for findex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Directory traversal error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Server/API error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored value could not be interpreted.
    #[error("corrupt value for {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

/// Directory traversal errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A directory could not be enumerated at all.
    #[error("failed to read directory '{path}': {reason}")]
    ReadDir { path: String, reason: String },

    /// A fan-out worker disappeared without reporting its chunk.
    #[error("worker for chunk {chunk} exited without a result")]
    ChunkLost { chunk: usize },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Change processing error.
    #[error("failed to process change for '{path}': {reason}")]
    ProcessFailed { path: String, reason: String },
}

/// Server/API errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Request handling error.
    #[error("request error: {0}")]
    Request(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl ScanError {
    /// Create a read-dir error from an I/O failure.
    pub fn read_dir(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::ReadDir {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

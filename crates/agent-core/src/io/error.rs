//! Error types for running-plugin persistence

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the running-plugin store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to acquire file lock after multiple retries
    #[error("Failed to acquire lock on {path} after {retries} retries")]
    LockTimeout { path: PathBuf, retries: u32 },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse or encode JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Store backend refused the operation
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

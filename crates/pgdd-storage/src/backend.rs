//! Storage backend trait

use pgdd_core::config::{StorageConfig, BACKEND_FILESYSTEM};
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::fs::FsBackend;

/// Byte stream handed to a backend
pub type DumpReader = dyn AsyncRead + Unpin + Send;

/// Errors that can occur while storing a dump
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("Invalid storage root {root}: {reason}")]
    InvalidRoot { root: String, reason: String },

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("Storage IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage operation cancelled")]
    Cancelled,
}

/// A place dumps can be written to
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend name (e.g., "filesystem")
    fn name(&self) -> &'static str;

    /// Persist everything `reader` yields under `path`
    ///
    /// Returns the location of the stored object. The object must only
    /// become visible at that location once `reader` reached end-of-stream.
    async fn put(&self, path: &str, reader: &mut DumpReader) -> Result<String, StorageError>;
}

/// Create the backend named in the configuration
pub fn backend_from_config(config: &StorageConfig) -> Result<Box<dyn Backend>, StorageError> {
    match config.backend.as_str() {
        BACKEND_FILESYSTEM => {
            tracing::debug!("using filesystem as backend");
            Ok(Box::new(FsBackend::new(&config.filesystem)?))
        }
        other => Err(StorageError::UnknownBackend(other.to_string())),
    }
}

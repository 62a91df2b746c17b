//! Bounded storage operations
//!
//! [`Storage`] wraps a backend with the export's timeout and a shared
//! cancellation token. A timeout cancels the token so the producer
//! writing into the pipe stops as well.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, DumpReader, StorageError};

/// Backend plus the bound applied to every `put`
pub struct Storage {
    backend: Box<dyn Backend>,
    timeout: Duration,
}

impl Storage {
    pub fn new(backend: Box<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Store the stream under `path`
    ///
    /// Fails with [`StorageError::Cancelled`] when `token` is cancelled and
    /// with [`StorageError::Timeout`] when the bound elapses; the latter
    /// cancels `token` before returning.
    pub async fn put(
        &self,
        path: &str,
        reader: &mut DumpReader,
        token: &CancellationToken,
    ) -> Result<String, StorageError> {
        tracing::debug!(backend = self.backend.name(), path, timeout = ?self.timeout, "storing dump");

        tokio::select! {
            biased;

            _ = token.cancelled() => {
                tracing::debug!(path, "storage cancelled");
                Err(StorageError::Cancelled)
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::error!(path, timeout = ?self.timeout, "storage timed out");
                token.cancel();
                Err(StorageError::Timeout(self.timeout))
            }
            result = self.backend.put(path, reader) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsBackend;
    use pgdd_core::FileSystemConfig;
    use tokio::io::AsyncWriteExt;

    fn storage(root: &std::path::Path, timeout: Duration) -> Storage {
        let backend = FsBackend::new(&FileSystemConfig {
            root: root.to_path_buf(),
        })
        .unwrap();
        Storage::new(Box::new(backend), timeout)
    }

    #[tokio::test]
    async fn test_put_completes_within_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Duration::from_secs(5));
        let token = CancellationToken::new();

        let mut reader: &[u8] = b"BEGIN;\n";
        let location = storage.put("dump.sql", &mut reader, &token).await.unwrap();

        assert!(location.ends_with("dump.sql"));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stream_times_out_and_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Duration::from_secs(180));
        let token = CancellationToken::new();

        // Writer half stays open and silent
        let (_writer, mut reader) = tokio::io::duplex(64);

        let err = storage.put("dump.sql", &mut reader, &token).await.unwrap_err();

        assert!(matches!(err, StorageError::Timeout(d) if d == Duration::from_secs(180)));
        assert!(token.is_cancelled());
        assert!(!dir.path().join("dump.sql").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_mid_copy_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Duration::from_secs(180));
        let token = CancellationToken::new();

        // Some data arrives, then the producer stalls
        let (mut writer, mut reader) = tokio::io::duplex(64);
        writer.write_all(b"BEGIN;\n").await.unwrap();

        let err = storage.put("dump.sql", &mut reader, &token).await.unwrap_err();

        assert!(matches!(err, StorageError::Timeout(_)));
        assert!(!dir.path().join("dump.sql.partial").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_put() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), Duration::from_secs(180));
        let token = CancellationToken::new();
        token.cancel();

        let (_writer, mut reader) = tokio::io::duplex(64);

        let err = storage.put("dump.sql", &mut reader, &token).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

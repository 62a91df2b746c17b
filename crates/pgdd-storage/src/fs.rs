//! Filesystem storage backend
//!
//! Writes go to `<path>.partial` first and are renamed into place only
//! after the stream ends cleanly, so an interrupted export never leaves a
//! file under the final name.

use pgdd_core::FileSystemConfig;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::backend::{Backend, DumpReader, StorageError};

/// Suffix of in-progress files
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Filesystem implementation of [`Backend`]
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at the configured directory
    ///
    /// The root must exist; an empty root or `/` is rejected.
    pub fn new(config: &FileSystemConfig) -> Result<Self, StorageError> {
        let root = &config.root;
        let display = root.display().to_string();

        if display.trim().is_empty() || root.components().all(|c| matches!(c, Component::RootDir)) {
            return Err(StorageError::InvalidRoot {
                root: display,
                reason: "empty or root path given".to_string(),
            });
        }

        let metadata = std::fs::metadata(root).map_err(|e| StorageError::InvalidRoot {
            root: display.clone(),
            reason: format!("make sure volume is mounted: {}", e),
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::InvalidRoot {
                root: display,
                reason: "not a directory".to_string(),
            });
        }

        tracing::debug!(root = %root.display(), "fs backend");

        Ok(Self { root: root.clone() })
    }

    /// Resolve a relative object path inside the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || escapes || relative.file_name().is_none() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// In-progress file, removed on drop unless committed
///
/// Covers every way out of `put`, including the future being dropped by
/// a timeout or cancellation while the copy is still running.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    /// Create the file synchronously so the guard exists before the first await
    fn create(path: PathBuf) -> Result<(Self, tokio::fs::File), StorageError> {
        let file = std::fs::File::create(&path).map_err(|e| io_error(&path, e))?;
        let guard = Self {
            path,
            committed: false,
        };
        Ok((guard, tokio::fs::File::from_std(file)))
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(file = %self.path.display(), "removed partial dump"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(file = %self.path.display(), error = %e, "failed to remove partial dump")
            }
        }
    }
}

#[async_trait::async_trait]
impl Backend for FsBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn put(&self, path: &str, reader: &mut DumpReader) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        let partial = partial_path(&target);

        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }

        let (guard, mut file) = PartialFile::create(partial.clone())?;

        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| io_error(&partial, e))?;

        file.flush().await.map_err(|e| io_error(&partial, e))?;
        file.sync_all().await.map_err(|e| io_error(&partial, e))?;
        drop(file);

        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|e| io_error(&target, e))?;
        guard.commit();

        tracing::debug!(file = %target.display(), bytes = written, "stored dump");

        Ok(target.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    fn backend(root: &Path) -> FsBackend {
        FsBackend::new(&FileSystemConfig {
            root: root.to_path_buf(),
        })
        .unwrap()
    }

    /// Yields some bytes, then fails
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "producer failed")))
            } else {
                self.sent = true;
                buf.put_slice(b"BEGIN;\n");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn test_put_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = backend(dir.path());

        let mut reader: &[u8] = b"BEGIN;\nCOMMIT;\n";
        let location = fs.put("dump.sql", &mut reader).await.unwrap();

        assert_eq!(location, dir.path().join("dump.sql").display().to_string());
        assert_eq!(std::fs::read(dir.path().join("dump.sql")).unwrap(), b"BEGIN;\nCOMMIT;\n");
        assert!(!dir.path().join("dump.sql.partial").exists());
    }

    #[tokio::test]
    async fn test_put_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs = backend(dir.path());

        let mut reader: &[u8] = b"x";
        fs.put("nightly/2024/dump.sql", &mut reader).await.unwrap();

        assert!(dir.path().join("nightly/2024/dump.sql").exists());
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = backend(dir.path());

        let mut reader = FailingReader { sent: false };
        let err = fs.put("dump.sql", &mut reader).await.unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!dir.path().join("dump.sql").exists());
        assert!(!dir.path().join("dump.sql.partial").exists());
    }

    #[tokio::test]
    async fn test_paths_escaping_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = backend(dir.path());

        for path in ["../dump.sql", "/etc/dump.sql", "", "a/../../b"] {
            let mut reader: &[u8] = b"x";
            assert!(
                matches!(fs.put(path, &mut reader).await, Err(StorageError::InvalidPath(_))),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_invalid_roots() {
        for root in ["", "/"] {
            let result = FsBackend::new(&FileSystemConfig {
                root: PathBuf::from(root),
            });
            assert!(matches!(result, Err(StorageError::InvalidRoot { .. })), "{:?}", root);
        }

        let result = FsBackend::new(&FileSystemConfig {
            root: PathBuf::from("/nonexistent/pgdd/root"),
        });
        assert!(matches!(result, Err(StorageError::InvalidRoot { .. })));
    }
}

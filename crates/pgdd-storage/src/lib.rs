//! Durable storage for produced dumps
//!
//! A [`Backend`] persists a byte stream under a path; [`Storage`] bounds
//! the whole transfer with a timeout and a cancellation token.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgdd_storage::{backend_from_config, Storage};
//!
//! let backend = backend_from_config(&config.storage)?;
//! let storage = Storage::new(backend, config.storage.timeout());
//! let location = storage.put("dump.sql", &mut reader, &token).await?;
//! ```

pub mod backend;
pub mod fs;
pub mod storage;

pub use backend::{backend_from_config, Backend, DumpReader, StorageError};
pub use fs::FsBackend;
pub use storage::Storage;

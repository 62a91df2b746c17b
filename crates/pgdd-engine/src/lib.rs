//! pgdd engine - dependency-ordered data dumps
//!
//! This crate implements the dump itself:
//! - Dependency navigation over foreign keys
//! - Dump assembly in `COPY ... FROM stdin` format
//! - The producer/consumer export into a storage backend

pub mod dumper;
pub mod error;
pub mod navigator;
pub mod pipeline;

pub use dumper::{quote_ident, Dumper};
pub use error::DumpError;
pub use navigator::Navigator;
pub use pipeline::{dump_file_name, export};

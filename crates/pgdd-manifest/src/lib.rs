//! Export manifest parsing
//!
//! This crate handles:
//! - Loading the manifest document (YAML, JSON or TOML)
//! - The per-table export configuration (`TableSpec`)
//! - Variables used to template custom extraction queries

pub mod manifest;
pub mod table;

pub use manifest::{Manifest, ManifestError, ManifestVariables};
pub use table::TableSpec;

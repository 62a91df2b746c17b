//! Database collaborators for the dump engine
//!
//! This crate provides the three operations the engine needs from the
//! source database: column lookup, one-hop foreign-key lookup, and a
//! streaming bulk copy of a table or derived relation.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support via `tokio-postgres`
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgdd_catalog::{DatabaseAdapter, PostgresAdapter};
//! use pgdd_core::DatabaseConfig;
//!
//! let db = PostgresAdapter::connect(&DatabaseConfig::default()).await?;
//! let columns = db.list_columns("public.users").await?;
//! let parents = db.list_dependencies("public.orders").await?;
//! ```

pub mod adapter;
pub mod mock;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{CatalogError, CopySink, DatabaseAdapter};
pub use mock::{MockCall, MockDatabase, MockDatabaseBuilder, MockTable};

#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;

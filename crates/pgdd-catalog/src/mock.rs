//! Mock database adapter for testing
//!
//! This adapter serves tables from memory without connecting to any
//! database. It's useful for:
//! - Unit testing dependency ordering and dump assembly
//! - Simulating lookup, copy and sink failures
//! - Simulating slow copies for timeout handling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pgdd_catalog::{MockDatabase, MockTable, DatabaseAdapter};
//!
//! let db = MockDatabase::builder()
//!     .with_table(MockTable::new("users").with_columns(["id", "name"]).with_rows("1\tAlice\n"))
//!     .with_table(MockTable::new("orders").with_columns(["id", "user_id"]).depends_on(["users"]))
//!     .build();
//!
//! assert_eq!(db.list_dependencies("orders").await?, vec!["users"]);
//! ```

use crate::adapter::{CatalogError, CopySink, DatabaseAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// A table served by [`MockDatabase`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockTable {
    /// Table name as the engine will ask for it
    pub name: String,

    /// Columns in schema order
    pub columns: Vec<String>,

    /// Referenced tables, returned exactly as configured
    pub dependencies: Vec<String>,

    /// Raw bulk-copy payload
    pub rows: Vec<u8>,
}

impl MockTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn depends_on<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rows(mut self, rows: impl Into<Vec<u8>>) -> Self {
        self.rows = rows.into();
        self
    }
}

/// A recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockCall {
    ListColumns(String),
    ListDependencies(String),
    StreamCopy(String),
}

/// Mock database adapter for testing
///
/// Every call is recorded, and any call can be made to fail by registering
/// an error for it with [`MockDatabase::add_error`].
pub struct MockDatabase {
    /// Tables by name
    tables: Arc<RwLock<HashMap<String, MockTable>>>,

    /// Copy payloads for derived-relation sources, keyed by the exact source text
    queries: Arc<RwLock<HashMap<String, Vec<u8>>>>,

    /// Errors to return for specific calls
    errors: Arc<RwLock<HashMap<MockCall, CatalogError>>>,

    /// Call log in order
    calls: Arc<RwLock<Vec<MockCall>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulated latency before each copy (milliseconds)
    copy_latency_ms: u64,
}

impl MockDatabase {
    /// Create an empty mock database
    pub fn new() -> Self {
        MockDatabaseBuilder::new().build()
    }

    /// Start building a mock database
    pub fn builder() -> MockDatabaseBuilder {
        MockDatabaseBuilder::new()
    }

    /// Add or replace a table
    pub async fn add_table(&self, table: MockTable) {
        self.tables.write().await.insert(table.name.clone(), table);
    }

    /// Register the payload returned when copying a derived relation
    pub async fn add_query_rows(&self, source: impl Into<String>, rows: impl Into<Vec<u8>>) {
        self.queries.write().await.insert(source.into(), rows.into());
    }

    /// Make a specific call fail
    pub async fn add_error(&self, call: MockCall, error: CatalogError) {
        self.errors.write().await.insert(call, error);
    }

    /// All calls made so far, in order
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Number of times a specific call was made
    pub async fn call_count(&self, call: &MockCall) -> usize {
        self.calls.read().await.iter().filter(|c| *c == call).count()
    }

    /// Sources copied so far, in order
    pub async fn copied_sources(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                MockCall::StreamCopy(source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    /// Record a call and return its configured error, if any
    async fn record(&self, call: MockCall) -> Result<(), CatalogError> {
        self.calls.write().await.push(call.clone());
        match self.errors.read().await.get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn table(&self, name: &str) -> Result<MockTable, CatalogError> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockDatabase {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            queries: Arc::clone(&self.queries),
            errors: Arc::clone(&self.errors),
            calls: Arc::clone(&self.calls),
            fail_connection: self.fail_connection,
            copy_latency_ms: self.copy_latency_ms,
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for MockDatabase {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        self.record(MockCall::ListColumns(table.to_string())).await?;
        Ok(self.table(table).await?.columns)
    }

    async fn list_dependencies(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        self.record(MockCall::ListDependencies(table.to_string())).await?;
        Ok(self.table(table).await?.dependencies)
    }

    async fn stream_copy(&self, sink: &mut CopySink, source: &str) -> Result<u64, CatalogError> {
        self.record(MockCall::StreamCopy(source.to_string())).await?;

        if self.copy_latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.copy_latency_ms)).await;
        }

        let rows = if source.starts_with('(') {
            self.queries
                .read()
                .await
                .get(source)
                .cloned()
                .ok_or_else(|| CatalogError::CopyError(format!("no rows registered for {}", source)))?
        } else {
            self.table(source).await?.rows
        };

        sink.write_all(&rows)
            .await
            .map_err(|e| CatalogError::SinkError(e.to_string()))?;

        Ok(rows.len() as u64)
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        if self.fail_connection {
            Err(CatalogError::ConnectionError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Builder for creating MockDatabase with predefined tables
pub struct MockDatabaseBuilder {
    tables: HashMap<String, MockTable>,
    queries: HashMap<String, Vec<u8>>,
    errors: HashMap<MockCall, CatalogError>,
    fail_connection: bool,
    copy_latency_ms: u64,
}

impl MockDatabaseBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            queries: HashMap::new(),
            errors: HashMap::new(),
            fail_connection: false,
            copy_latency_ms: 0,
        }
    }

    /// Add a table
    pub fn with_table(mut self, table: MockTable) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Add the payload for a derived-relation source
    pub fn with_query_rows(mut self, source: impl Into<String>, rows: impl Into<Vec<u8>>) -> Self {
        self.queries.insert(source.into(), rows.into());
        self
    }

    /// Make a specific call fail
    pub fn with_error(mut self, call: MockCall, error: CatalogError) -> Self {
        self.errors.insert(call, error);
        self
    }

    /// Fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Delay every copy by `latency_ms`
    pub fn with_copy_latency(mut self, latency_ms: u64) -> Self {
        self.copy_latency_ms = latency_ms;
        self
    }

    /// Build the mock database
    pub fn build(self) -> MockDatabase {
        MockDatabase {
            tables: Arc::new(RwLock::new(self.tables)),
            queries: Arc::new(RwLock::new(self.queries)),
            errors: Arc::new(RwLock::new(self.errors)),
            calls: Arc::new(RwLock::new(Vec::new())),
            fail_connection: self.fail_connection,
            copy_latency_ms: self.copy_latency_ms,
        }
    }
}

impl Default for MockDatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Database adapter trait used by the dump engine

use tokio::io::AsyncWrite;

/// Destination of a bulk copy
pub type CopySink = dyn AsyncWrite + Unpin + Send;

/// Errors that can occur when talking to the source database
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Copy failed: {0}")]
    CopyError(String),

    #[error("Failed to write copy output: {0}")]
    SinkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CatalogError {
    /// Classify a driver error message the way the database reports it
    pub fn from_query_message(table: &str, message: String) -> Self {
        if message.contains("does not exist") {
            CatalogError::TableNotFound(table.to_string())
        } else if message.contains("permission denied") {
            CatalogError::PermissionDenied(format!("Cannot access {}: {}", table, message))
        } else {
            CatalogError::QueryError(message)
        }
    }
}

/// Source database operations needed to produce a dump
///
/// Table names are passed through as written in the manifest, so they may
/// be schema-qualified (`public.users`). The copy source is either such a
/// name or a parenthesized query.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Column names of a table in schema order, dropped columns excluded
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, CatalogError>;

    /// Distinct tables directly referenced by the table's foreign keys
    ///
    /// Self-references are not included.
    async fn list_dependencies(&self, table: &str) -> Result<Vec<String>, CatalogError>;

    /// Copy the row data of `source` into `sink` in bulk-load text format
    ///
    /// Returns the number of bytes written.
    async fn stream_copy(&self, sink: &mut CopySink, source: &str) -> Result<u64, CatalogError>;

    /// Test the connection to the database
    async fn test_connection(&self) -> Result<(), CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_query_errors() {
        assert_eq!(
            CatalogError::from_query_message("t", "relation \"t\" does not exist".to_string()),
            CatalogError::TableNotFound("t".to_string())
        );
        assert!(matches!(
            CatalogError::from_query_message("t", "permission denied for table t".to_string()),
            CatalogError::PermissionDenied(_)
        ));
        assert!(matches!(
            CatalogError::from_query_message("t", "syntax error".to_string()),
            CatalogError::QueryError(_)
        ));
    }
}

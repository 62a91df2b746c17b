//! PostgreSQL adapter using the system catalogs
//!
//! Column lists come from `pg_attribute`, foreign-key dependencies from
//! `pg_constraint`, and row data from `COPY ... TO STDOUT`. Table names
//! are resolved through `regclass`, so they follow the server's
//! `search_path` rules and may be schema-qualified.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = DatabaseConfig {
//!     addr: "localhost:5432".to_string(),
//!     database: "shop".to_string(),
//!     ..DatabaseConfig::default()
//! };
//! let adapter = PostgresAdapter::connect(&config).await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/sql-copy.html

use crate::adapter::{CatalogError, CopySink, DatabaseAdapter};
use futures::StreamExt;
use native_tls::TlsConnector;
use pgdd_core::DatabaseConfig;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

const COLUMNS_QUERY: &str = r#"
    SELECT attname::text
    FROM pg_catalog.pg_attribute
    WHERE attrelid = $1::text::regclass
      AND attnum > 0
      AND NOT attisdropped
    ORDER BY attnum
"#;

const DEPENDENCIES_QUERY: &str = r#"
    SELECT DISTINCT confrelid::regclass::text
    FROM pg_catalog.pg_constraint
    WHERE conrelid = $1::text::regclass
      AND contype = 'f'
      AND confrelid <> conrelid
    ORDER BY 1
"#;

/// PostgreSQL database adapter
pub struct PostgresAdapter {
    client: Client,

    /// Bound for metadata queries
    read_timeout: Duration,
}

impl PostgresAdapter {
    /// Connect using the database section of the configuration
    ///
    /// Failed attempts are retried up to `max_retries` times.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CatalogError> {
        let (host, port) = config
            .host_port()
            .map_err(|e| CatalogError::ConfigError(e.to_string()))?;

        let mut pg = PgConfig::new();
        pg.host(&host)
            .port(port)
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .application_name("pgdd")
            .connect_timeout(config.dial_timeout());

        let mut attempt = 0;
        let client = loop {
            match Self::connect_once(&pg, config.ssl, &host, port).await {
                Ok(client) => break client,
                Err(e) if attempt < config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        host = %host,
                        port,
                        attempt,
                        max_retries = config.max_retries,
                        error = %e,
                        "retrying database connection"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        tracing::debug!(database = %config.database, user = %config.user, "connected to the database");

        Ok(Self {
            client,
            read_timeout: config.read_timeout(),
        })
    }

    async fn connect_once(
        pg: &PgConfig,
        ssl: bool,
        host: &str,
        port: u16,
    ) -> Result<Client, CatalogError> {
        if ssl {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| CatalogError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = pg
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| CatalogError::ConnectionError(format!(
                    "Failed to connect to PostgreSQL at {}:{} with TLS: {}",
                    host, port, e
                )))?;

            // Spawn connection handler in background
            let (host, port) = (host.to_string(), port);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(host = %host, port, error = %e, "PostgreSQL TLS connection error");
                }
            });

            Ok(client)
        } else {
            let (client, connection) = pg
                .connect(NoTls)
                .await
                .map_err(|e| CatalogError::ConnectionError(format!(
                    "Failed to connect to PostgreSQL at {}:{}: {}",
                    host, port, e
                )))?;

            // Spawn connection handler in background
            let (host, port) = (host.to_string(), port);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(host = %host, port, error = %e, "PostgreSQL connection error");
                }
            });

            Ok(client)
        }
    }

    /// Run a single-column catalog query for `table`
    async fn query_names(&self, sql: &str, table: &str) -> Result<Vec<String>, CatalogError> {
        let rows = tokio::time::timeout(self.read_timeout, self.client.query(sql, &[&table]))
            .await
            .map_err(|_| CatalogError::Timeout(format!(
                "catalog query for {} exceeded {:?}",
                table, self.read_timeout
            )))?
            .map_err(|e| CatalogError::from_query_message(table, error_message(&e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| CatalogError::QueryError(e.to_string()))
            })
            .collect()
    }
}

/// `COPY` statement for a table name or parenthesized query
pub fn copy_statement(source: &str) -> String {
    format!("COPY {} TO STDOUT", source)
}

/// Prefer the server's message over the driver's wrapper text
fn error_message(error: &tokio_postgres::Error) -> String {
    error
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| error.to_string())
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        let columns = self.query_names(COLUMNS_QUERY, table).await?;
        tracing::debug!(table, columns = %columns.join(","), "get table columns");
        Ok(columns)
    }

    async fn list_dependencies(&self, table: &str) -> Result<Vec<String>, CatalogError> {
        let tables = self.query_names(DEPENDENCIES_QUERY, table).await?;
        tracing::debug!(table, dependencies = %tables.join(","), "get table dependencies");
        Ok(tables)
    }

    async fn stream_copy(&self, sink: &mut CopySink, source: &str) -> Result<u64, CatalogError> {
        let statement = copy_statement(source);

        let stream = self
            .client
            .copy_out(statement.as_str())
            .await
            .map_err(|e| CatalogError::CopyError(format!("{}: {}", statement, error_message(&e))))?;
        futures::pin_mut!(stream);

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| CatalogError::CopyError(format!("{}: {}", statement, error_message(&e))))?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| CatalogError::SinkError(e.to_string()))?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| CatalogError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }
}

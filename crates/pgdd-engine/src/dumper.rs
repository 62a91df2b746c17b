//! Dump assembly
//!
//! Writes the textual dump: a fixed preamble and session settings, one
//! `COPY ... FROM stdin` block per table in navigator order, and the
//! closing `COMMIT`. The output loads with `psql -f`.

use pgdd_catalog::{CopySink, DatabaseAdapter};
use pgdd_core::TableReport;
use pgdd_manifest::{Manifest, TableSpec};
use pgdd_template::{QueryRenderer, TemplateSyntax, UndefinedPolicy};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::error::DumpError;
use crate::navigator::Navigator;

/// Dump banner and transaction start
pub const DUMP_HEADER: &str = "
--
-- PostgreSQL database dump
--\t

BEGIN;
";

/// Session settings applied before any data is loaded
pub const DUMP_SETTINGS: &str = "
SET statement_timeout = 0;
SET lock_timeout = 0;
SET client_encoding = 'UTF8';
SET standard_conforming_strings = on;
SET check_function_bodies = false;
SET client_min_messages = warning;

SET search_path = public, pg_catalog;
";

/// Transaction end and closing banner
pub const DUMP_FOOTER: &str = "
COMMIT;

--
-- PostgreSQL database dump complete
--
";

/// End-of-data marker of a `COPY ... FROM stdin` block
pub const END_OF_DATA: &str = "\\.\n";

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Header of a table's data block
pub fn table_header(table: &str, columns: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "\n--\n-- Data for Name: {table}; Type: TABLE DATA\n--\n\nCOPY {table} ({columns}) FROM stdin;\n",
        table = table,
        columns = columns
    )
}

/// Post action as a standalone statement
pub fn post_action(action: &str) -> String {
    format!("\n{};\n", action)
}

/// Produces dumps for one manifest against one database
pub struct Dumper {
    db: Arc<dyn DatabaseAdapter>,
    manifest: Manifest,
    renderer: QueryRenderer,
}

impl Dumper {
    /// Create a dumper that renders undefined template variables as empty strings
    pub fn new(db: Arc<dyn DatabaseAdapter>, manifest: Manifest) -> Self {
        Self::with_policy(db, manifest, UndefinedPolicy::Lenient)
    }

    pub fn with_policy(
        db: Arc<dyn DatabaseAdapter>,
        manifest: Manifest,
        policy: UndefinedPolicy,
    ) -> Self {
        let renderer = QueryRenderer::with_policy(manifest.vars.clone(), policy);
        Self {
            db,
            manifest,
            renderer,
        }
    }

    /// Load the manifest at `path` and create a dumper for it
    pub fn from_manifest_file(
        db: Arc<dyn DatabaseAdapter>,
        path: &Path,
        policy: UndefinedPolicy,
    ) -> Result<Self, DumpError> {
        let manifest = Manifest::from_file(path).map_err(|e| {
            tracing::error!(manifest = %path.display(), error = %e, "failed to create dumper");
            e
        })?;

        tracing::debug!(
            manifest = %path.display(),
            tables = manifest.tables.len(),
            database = db.name(),
            "create dumper instance"
        );

        Ok(Self::with_policy(db, manifest, policy))
    }

    /// Render extraction queries in the given template syntax
    pub fn with_syntax(mut self, syntax: TemplateSyntax) -> Self {
        self.renderer = self.renderer.with_syntax(syntax);
        self
    }

    fn copy_source(&self, table: &TableSpec) -> Result<String, DumpError> {
        self.renderer
            .copy_source(table)
            .map_err(|source| DumpError::Template {
                table: table.name.clone(),
                source,
            })
    }

    /// Write the complete dump into `sink`
    ///
    /// Returns a summary per table in emission order. The first failure
    /// aborts the dump; whatever was already written stays in the sink.
    pub async fn dump(&self, sink: &mut CopySink) -> Result<Vec<TableReport>, DumpError> {
        tracing::info!(tables = self.manifest.tables.len(), "starting dump");

        write(sink, DUMP_HEADER).await?;
        write(sink, DUMP_SETTINGS).await?;

        let mut nav = Navigator::new(self.db.as_ref(), &self.manifest);
        let mut reports = Vec::new();

        while nav.has_next() {
            let Some(table) = nav.next().await? else {
                break;
            };

            let source = self.copy_source(&table)?;

            write(sink, &table_header(&table.name, &table.columns)).await?;

            let bytes = self
                .db
                .stream_copy(sink, &source)
                .await
                .map_err(|source| {
                    tracing::error!(table = %table.name, error = %source, "failed to copy table data");
                    DumpError::Copy {
                        table: table.name.clone(),
                        source,
                    }
                })?;

            write(sink, END_OF_DATA).await?;

            for action in &table.post_actions {
                write(sink, &post_action(action)).await?;
            }

            tracing::debug!(table = %table.name, bytes, "table dumped");

            reports.push(TableReport {
                implicit: nav.is_implicit(&table.name),
                table: table.name,
                source,
                columns: table.columns,
                post_actions: table.post_actions.len(),
                bytes,
            });
        }

        write(sink, DUMP_FOOTER).await?;
        sink.flush().await.map_err(DumpError::Sink)?;

        tracing::info!(tables = reports.len(), "dump complete");

        Ok(reports)
    }

    /// Resolve the emission order, columns and copy sources without copying data
    pub async fn plan(&self) -> Result<Vec<TableReport>, DumpError> {
        let mut nav = Navigator::new(self.db.as_ref(), &self.manifest);
        let mut plan = Vec::new();

        while let Some(table) = nav.next().await? {
            let source = self.copy_source(&table)?;
            plan.push(TableReport {
                implicit: nav.is_implicit(&table.name),
                table: table.name,
                source,
                columns: table.columns,
                post_actions: table.post_actions.len(),
                bytes: 0,
            });
        }

        Ok(plan)
    }
}

async fn write(sink: &mut CopySink, text: &str) -> Result<(), DumpError> {
    sink.write_all(text.as_bytes()).await.map_err(|e| {
        tracing::error!(error = %e, "failed to write dump output");
        DumpError::Sink(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("id"), "\"id\"");
        assert_eq!(quote_ident("Order Date"), "\"Order Date\"");
        assert_eq!(quote_ident("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_table_header() {
        let header = table_header("public.users", &["id".to_string(), "email".to_string()]);
        assert_eq!(
            header,
            "\n--\n-- Data for Name: public.users; Type: TABLE DATA\n--\n\nCOPY public.users (\"id\", \"email\") FROM stdin;\n"
        );
    }

    #[test]
    fn test_post_action() {
        assert_eq!(
            post_action("SELECT setval('users_id_seq', 42)"),
            "\nSELECT setval('users_id_seq', 42);\n"
        );
    }

    #[test]
    fn test_fixed_blocks() {
        assert!(DUMP_HEADER.ends_with("BEGIN;\n"));
        assert!(DUMP_HEADER.contains("--\t\n"));
        assert!(DUMP_SETTINGS.contains("SET search_path = public, pg_catalog;"));
        assert!(DUMP_FOOTER.starts_with("\nCOMMIT;\n"));
        assert_eq!(END_OF_DATA, "\\.\n");
    }
}

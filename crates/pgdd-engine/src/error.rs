//! Dump error taxonomy

use pgdd_catalog::CatalogError;
use pgdd_manifest::ManifestError;
use pgdd_storage::StorageError;
use pgdd_template::TemplateError;

/// Errors that abort an export
///
/// Nothing is retried at this layer: the first error ends the dump and
/// bytes already handed to the sink stay where they are.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to look up dependencies of {table}: {source}")]
    DependencyLookup {
        table: String,
        #[source]
        source: CatalogError,
    },

    #[error("Failed to look up columns of {table}: {source}")]
    ColumnLookup {
        table: String,
        #[source]
        source: CatalogError,
    },

    #[error("Failed to render query for {table}: {source}")]
    Template {
        table: String,
        #[source]
        source: TemplateError,
    },

    #[error("Failed to copy data of {table}: {source}")]
    Copy {
        table: String,
        #[source]
        source: CatalogError,
    },

    #[error("Failed to write dump output: {0}")]
    Sink(#[source] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Cyclic foreign key dependency: {table} depends on {dependency}, which is still waiting for {table}")]
    CyclicDependency { table: String, dependency: String },

    #[error("Dump cancelled")]
    Cancelled,
}

impl DumpError {
    /// Whether this error only reports that another failure stopped the export
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            DumpError::Cancelled | DumpError::Storage(StorageError::Cancelled)
        )
    }
}

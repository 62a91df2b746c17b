//! Export report schema (stable v1)
//!
//! Written after a successful dump when `--report` is given.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigError;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One exported table, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Table name
    pub table: String,

    /// Copy source (table name or parenthesized query)
    pub source: String,

    /// Columns in the data block header
    pub columns: Vec<String>,

    /// Number of post actions emitted
    pub post_actions: usize,

    /// Bytes of row data copied
    pub bytes: u64,

    /// Whether the table came from the manifest or was discovered as a dependency
    pub implicit: bool,
}

/// Export report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Where the dump was stored
    pub location: String,

    /// Tables in emission order
    pub tables: Vec<TableReport>,

    /// Total bytes of row data copied
    pub bytes_copied: u64,

    /// Wall-clock duration of the export in milliseconds
    pub duration_ms: u64,
}

impl ExportReport {
    /// Create a report for a finished export
    pub fn new(location: impl Into<String>, tables: Vec<TableReport>, duration_ms: u64) -> Self {
        let bytes_copied = tables.iter().map(|t| t.bytes).sum();

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            location: location.into(),
            tables,
            bytes_copied,
            duration_ms,
        }
    }

    /// Number of tables that were not listed in the manifest
    pub fn implicit_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.implicit).count()
    }

    /// Save report to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, bytes: u64, implicit: bool) -> TableReport {
        TableReport {
            table: name.to_string(),
            source: name.to_string(),
            columns: vec!["id".to_string()],
            post_actions: 0,
            bytes,
            implicit,
        }
    }

    #[test]
    fn totals_are_summed() {
        let report = ExportReport::new(
            "/tmp/pdd/dump.sql",
            vec![table("users", 10, true), table("orders", 32, false)],
            5,
        );
        assert_eq!(report.bytes_copied, 42);
        assert_eq!(report.implicit_tables(), 1);
        assert_eq!(report.version, ReportVersion::CURRENT);
    }

    #[test]
    fn save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = ExportReport::new("dump.sql", vec![table("users", 1, false)], 1);
        report.save_to_file(&path).unwrap();

        let parsed: ExportReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}

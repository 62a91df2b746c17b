//! pgdd core
//!
//! Shared configuration and the export report format.

pub mod config;
pub mod report;

pub use config::{
    Config, ConfigError, DatabaseConfig, DumpConfig, FileSystemConfig, LogFormat, LogLevel,
    LoggingConfig, StorageConfig,
};
pub use report::{ExportReport, ReportVersion, TableReport};

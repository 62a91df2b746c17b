//! Producer/consumer export
//!
//! The dumper writes into one end of a bounded in-memory pipe while the
//! storage backend drains the other, so the dump is never held in memory
//! as a whole. Both sides share a cancellation token: whichever side
//! fails first cancels it, the other side stops with a cancellation
//! error, and the failure that started it is what gets reported.

use chrono::{DateTime, TimeZone};
use pgdd_core::ExportReport;
use pgdd_storage::Storage;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::dumper::Dumper;
use crate::error::DumpError;

/// Pipe buffer between dumper and storage
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Name of the dump file for a given moment, `dump-YYYYMMDD-HHMMSS.sql`
pub fn dump_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("dump-%Y%m%d-%H%M%S.sql").to_string()
}

/// Dump and store under `path`
///
/// Succeeds only when the dump finished and the backend committed it.
pub async fn export(
    dumper: &Dumper,
    storage: &Storage,
    path: &str,
) -> Result<ExportReport, DumpError> {
    let started = Instant::now();
    let token = CancellationToken::new();
    let (mut writer, mut reader) = tokio::io::duplex(PIPE_CAPACITY);

    tracing::info!(path, backend = storage.backend_name(), "starting export");

    let producer = {
        let token = token.clone();
        async move {
            let mut result = tokio::select! {
                biased;

                _ = token.cancelled() => Err(DumpError::Cancelled),
                result = dumper.dump(&mut writer) => result,
            };

            if result.is_ok() {
                if let Err(e) = writer.shutdown().await {
                    result = Err(DumpError::Sink(e));
                }
            }

            // Cancel before the pipe closes so the consumer never mistakes
            // a failed dump for a complete one
            if result.is_err() {
                token.cancel();
            }
            drop(writer);

            result
        }
    };

    let consumer = {
        let token = token.clone();
        async move {
            let result = storage.put(path, &mut reader, &token).await;
            if result.is_err() {
                token.cancel();
            }
            drop(reader);
            result
        }
    };

    let (produced, stored) = tokio::join!(producer, consumer);

    match (produced, stored) {
        (Ok(tables), Ok(location)) => {
            let report = ExportReport::new(location, tables, started.elapsed().as_millis() as u64);
            tracing::info!(
                location = %report.location,
                tables = report.tables.len(),
                bytes = report.bytes_copied,
                "export complete"
            );
            Ok(report)
        }
        (Err(dump_err), Err(storage_err)) if dump_err.is_cancellation() => {
            tracing::error!(error = %storage_err, "export failed");
            Err(storage_err.into())
        }
        (Err(dump_err), _) => {
            tracing::error!(error = %dump_err, "export failed");
            Err(dump_err)
        }
        (Ok(_), Err(storage_err)) => {
            tracing::error!(error = %storage_err, "export failed");
            Err(storage_err.into())
        }
    }
}

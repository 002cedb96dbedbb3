use crate::error::LogResult;
use crate::exporter::{ExportFuture, LogRecordExporter};
use crate::processor::{EnabledOptions, LogRecordProcessor};
use crate::record::LogRecord;
use crate::trace::Context;
use async_trait::async_trait;
use std::sync::Arc;

/// A processor that ignores every record.
///
/// Useful for measuring the overhead of loggers and the bridge layer
/// without any export, and for tests that don't care about delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogRecordProcessor;

#[async_trait]
impl LogRecordProcessor for NoopLogRecordProcessor {
    fn on_emit(&self, _record: &Arc<LogRecord>, _context: &Context) {}

    async fn force_flush(&self) -> LogResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> LogResult<()> {
        Ok(())
    }

    fn enabled(&self, _options: &EnabledOptions<'_>) -> bool {
        false
    }
}

/// An exporter that accepts and drops every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogRecordExporter;

impl LogRecordExporter for NoopLogRecordExporter {
    fn export(&self, _batch: Vec<Arc<LogRecord>>) -> ExportFuture {
        Box::pin(async { Ok(()) })
    }
}

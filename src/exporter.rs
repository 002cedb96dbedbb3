use crate::error::{LogError, LogResult};
use crate::record::LogRecord;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

/// Outcome of a single export call.
pub type ExportResult = Result<(), LogError>;

/// Future returned by [`LogRecordExporter::export`].
pub type ExportFuture = Pin<Box<dyn Future<Output = ExportResult> + Send + 'static>>;

/// Asynchronous destination for batches of [`LogRecord`]s.
///
/// Implementations transport records to a concrete backend (stdout,
/// memory, a network collector, ...). Processors own the batching; an
/// exporter only ever sees complete batches and never retries on their
/// behalf unless it wants to.
#[async_trait]
pub trait LogRecordExporter: Send + Sync + Debug {
    /// Export one batch of records.
    ///
    /// **Parameters**
    /// - `batch`: records in emission order. They are sealed; reading
    ///   them is always safe.
    ///
    /// **Returns**
    /// - A future resolving to `Ok(())` if the backend accepted the
    ///   batch, or `Err(..)` otherwise.
    ///
    /// This method is called synchronously by the processor and must not
    /// block. Any synchronous work happens here, completion is reported
    /// through the returned future. Processors apply their own timeout to
    /// the future and do not cancel it when it expires.
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> ExportFuture;

    /// Release backend resources. Called at most once by a processor.
    ///
    /// Default implementation is a no-op.
    async fn shutdown(&self) -> LogResult<()> {
        Ok(())
    }
}

/// Call `exporter.export`, turning a panic in its synchronous part into
/// a failed export instead of unwinding into the emitting code.
pub(crate) fn start_export(
    exporter: &dyn LogRecordExporter,
    batch: Vec<Arc<LogRecord>>,
) -> ExportFuture {
    match panic::catch_unwind(AssertUnwindSafe(|| exporter.export(batch))) {
        Ok(fut) => fut,
        Err(_) => Box::pin(async {
            Err(LogError::ExportTaskFailed("exporter panicked".to_string()))
        }),
    }
}

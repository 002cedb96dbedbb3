use crate::error::{LogError, LogResult};
use crate::exporter::{ExportFuture, LogRecordExporter};
use crate::record::LogRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Store {
    batches: Vec<Vec<Arc<LogRecord>>>,
}

/// Exporter keeping every exported batch in memory.
///
/// Cloning is cheap and every clone shares the same storage, so a test
/// can hand one clone to a processor and inspect the other.
///
/// After [`shutdown`](LogRecordExporter::shutdown) further exports fail;
/// records exported before that stay available.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogRecordExporter {
    store: Arc<Mutex<Store>>,
    shutdown: Arc<AtomicBool>,
}

impl InMemoryLogRecordExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every record exported so far, in export order.
    pub fn finished_records(&self) -> Vec<Arc<LogRecord>> {
        self.store().batches.concat()
    }

    /// Number of successful `export` calls.
    pub fn export_calls(&self) -> usize {
        self.store().batches.len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.store().batches.iter().map(Vec::len).collect()
    }

    /// Forget everything exported so far.
    pub fn reset(&self) {
        self.store().batches.clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[async_trait]
impl LogRecordExporter for InMemoryLogRecordExporter {
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> ExportFuture {
        if self.is_shutdown() {
            return Box::pin(async { Err(LogError::export_failed("exporter has been shut down")) });
        }
        self.store().batches.push(batch);
        Box::pin(async { Ok(()) })
    }

    async fn shutdown(&self) -> LogResult<()> {
        self.shutdown.store(true, Ordering::Release);
        Ok(())
    }
}

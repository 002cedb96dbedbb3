use crate::error::{LogError, LogResult};
use crate::processor::{EnabledOptions, LogRecordProcessor};
use crate::record::LogRecord;
use crate::trace::Context;
use async_trait::async_trait;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_FORCE_FLUSH_TIMEOUT: Duration = Duration::from_millis(30000);

/// Presents several processors as one.
///
/// Records are handed to every processor in registration order. Flush and
/// shutdown run on all of them concurrently.
#[derive(Debug, Clone)]
pub struct MultiLogRecordProcessor {
    processors: Vec<Arc<dyn LogRecordProcessor>>,
    force_flush_timeout: Duration,
}

impl MultiLogRecordProcessor {
    pub fn new(processors: Vec<Arc<dyn LogRecordProcessor>>) -> Self {
        Self::with_timeout(processors, DEFAULT_FORCE_FLUSH_TIMEOUT)
    }

    pub fn with_timeout(
        processors: Vec<Arc<dyn LogRecordProcessor>>,
        force_flush_timeout: Duration,
    ) -> Self {
        MultiLogRecordProcessor {
            processors,
            force_flush_timeout,
        }
    }

    pub fn processors(&self) -> &[Arc<dyn LogRecordProcessor>] {
        &self.processors
    }

    pub fn force_flush_timeout(&self) -> Duration {
        self.force_flush_timeout
    }
}

/// Await every task, then return the first failure.
///
/// The tasks are spawned up front, so dropping this future (on timeout)
/// detaches them instead of cancelling their work.
async fn join_all(tasks: Vec<JoinHandle<LogResult<()>>>) -> LogResult<()> {
    let mut first_err = None;
    for task in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => Err(LogError::ExportTaskFailed(join_err.to_string())),
        };
        if let Err(err) = result {
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}

#[async_trait]
impl LogRecordProcessor for MultiLogRecordProcessor {
    fn on_emit(&self, record: &Arc<LogRecord>, context: &Context) {
        for processor in &self.processors {
            let emitted = panic::catch_unwind(AssertUnwindSafe(|| processor.on_emit(record, context)));
            if emitted.is_err() {
                tracing::error!(processor = ?processor, "log record processor panicked in on_emit");
            }
        }
    }

    async fn force_flush(&self) -> LogResult<()> {
        let tasks = self
            .processors
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move { p.force_flush().await })
            })
            .collect();

        match tokio::time::timeout(self.force_flush_timeout, join_all(tasks)).await {
            Ok(result) => result,
            Err(_) => Err(LogError::Timeout(self.force_flush_timeout)),
        }
    }

    async fn shutdown(&self) -> LogResult<()> {
        let tasks = self
            .processors
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move { p.shutdown().await })
            })
            .collect();
        join_all(tasks).await
    }

    fn enabled(&self, options: &EnabledOptions<'_>) -> bool {
        self.processors.iter().any(|p| p.enabled(options))
    }
}

//! Fixtures shared by the unit tests.

use crate::error::{ErrorHandler, LogError};
use crate::exporter::{ExportFuture, ExportResult, LogRecordExporter};
use crate::record::{LogRecord, LogRecordLimits, LogRecordParams};
use crate::resource::{InstrumentationScope, Resource};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub(crate) fn record(body: &str) -> Arc<LogRecord> {
    record_with_resource(body, Arc::new(Resource::empty()))
}

pub(crate) fn record_with_resource(body: &str, resource: Arc<Resource>) -> Arc<LogRecord> {
    Arc::new(LogRecord::new(
        Arc::new(InstrumentationScope::new("test")),
        resource,
        LogRecordLimits::default(),
        LogRecordParams::new().with_body(body),
    ))
}

pub(crate) fn bodies(records: &[Arc<LogRecord>]) -> Vec<String> {
    records
        .iter()
        .map(|r| {
            r.body()
                .and_then(|b| b.as_str().map(str::to_owned))
                .unwrap_or_default()
        })
        .collect()
}

/// Error handler that keeps every reported error.
pub(crate) fn capturing_handler() -> (ErrorHandler, Arc<Mutex<Vec<LogError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_bg = Arc::clone(&errors);
    let handler = ErrorHandler::new(move |e| errors_bg.lock().unwrap().push(e));
    (handler, errors)
}

/// Let every runnable task make progress. Time is paused in the tests
/// that use this, so the sleep only completes once the runtime is idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Every export succeeds right away.
    Succeed,
    /// Every export fails right away.
    Fail,
    /// Exports stay pending until [`TestExporter::release`] is called.
    Gated,
}

/// Exporter recording every batch, with controllable completion.
#[derive(Debug)]
pub(crate) struct TestExporter {
    mode: Mode,
    batches: Mutex<Vec<Vec<Arc<LogRecord>>>>,
    gates: Mutex<Vec<oneshot::Sender<ExportResult>>>,
    shutdowns: AtomicUsize,
    shutdown_result: Mutex<Option<LogError>>,
}

impl TestExporter {
    pub(crate) fn new(mode: Mode) -> Arc<Self> {
        Arc::new(TestExporter {
            mode,
            batches: Mutex::new(Vec::new()),
            gates: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
            shutdown_result: Mutex::new(None),
        })
    }

    pub(crate) fn fail_shutdown_with(&self, err: LogError) {
        *self.shutdown_result.lock().unwrap() = Some(err);
    }

    pub(crate) fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub(crate) fn exported(&self) -> Vec<Arc<LogRecord>> {
        self.batches.lock().unwrap().concat()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Complete the oldest pending export.
    pub(crate) fn release(&self, result: ExportResult) {
        let mut gates = self.gates.lock().unwrap();
        assert!(!gates.is_empty(), "no export waiting to be released");
        let _ = gates.remove(0).send(result);
    }
}

#[async_trait]
impl LogRecordExporter for TestExporter {
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> ExportFuture {
        self.batches.lock().unwrap().push(batch);
        match self.mode {
            Mode::Succeed => Box::pin(async { Ok(()) }),
            Mode::Fail => Box::pin(async { Err(LogError::export_failed("backend unavailable")) }),
            Mode::Gated => {
                let (tx, rx) = oneshot::channel();
                self.gates.lock().unwrap().push(tx);
                Box::pin(async move { rx.await.unwrap_or(Ok(())) })
            }
        }
    }

    async fn shutdown(&self) -> crate::error::LogResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        match self.shutdown_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

use crate::batch::pending_resources;
use crate::error::{ConfigError, ErrorHandler, LogResult};
use crate::exporter::{start_export, LogRecordExporter};
use crate::processor::LogRecordProcessor;
use crate::record::LogRecord;
use crate::trace::Context;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Notify, OnceCell};

/// Processor that exports every record on its own, as soon as it is
/// emitted. Useful for tests and debugging; use
/// [`BatchLogRecordProcessor`](crate::batch::BatchLogRecordProcessor)
/// anywhere throughput matters.
pub struct SimpleLogRecordProcessor {
    exporter: Arc<dyn LogRecordExporter>,
    error_handler: ErrorHandler,
    runtime: Handle,
    in_flight: Arc<InFlight>,
    is_shutdown: AtomicBool,
    shutdown: OnceCell<LogResult<()>>,
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl SimpleLogRecordProcessor {
    /// Build on the current runtime.
    ///
    /// Returns [`ConfigError::NoRuntime`] outside of a Tokio runtime.
    pub fn new(exporter: Arc<dyn LogRecordExporter>) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Ok(Self::with_runtime(exporter, runtime))
    }

    pub fn with_runtime(exporter: Arc<dyn LogRecordExporter>, runtime: Handle) -> Self {
        SimpleLogRecordProcessor {
            exporter,
            error_handler: ErrorHandler::default(),
            runtime,
            in_flight: Arc::new(InFlight::default()),
            is_shutdown: AtomicBool::new(false),
            shutdown: OnceCell::new(),
        }
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }
}

#[async_trait]
impl LogRecordProcessor for SimpleLogRecordProcessor {
    fn on_emit(&self, record: &Arc<LogRecord>, _context: &Context) {
        // Count first, then check: shutdown flips the flag before waiting
        // for the count to reach zero, so one of the two sees the other.
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.start();
        if self.is_shutdown.load(Ordering::SeqCst) {
            in_flight.finish();
            return;
        }

        let batch = vec![Arc::clone(record)];
        let pending = pending_resources(&batch);
        let handler = self.error_handler.clone();

        if pending.is_empty() {
            let export = start_export(&*self.exporter, batch);
            self.runtime.spawn(async move {
                let result = export.await;
                in_flight.finish();
                if let Err(err) = result {
                    handler.handle(err);
                }
            });
        } else {
            let exporter = Arc::clone(&self.exporter);
            self.runtime.spawn(async move {
                for resource in &pending {
                    resource.wait_for_async_attributes().await;
                }
                let result = start_export(&*exporter, batch).await;
                in_flight.finish();
                if let Err(err) = result {
                    handler.handle(err);
                }
            });
        }
    }

    /// Wait for exports still in flight.
    async fn force_flush(&self) -> LogResult<()> {
        self.in_flight.wait_idle().await;
        Ok(())
    }

    async fn shutdown(&self) -> LogResult<()> {
        self.shutdown
            .get_or_init(|| async {
                self.is_shutdown.store(true, Ordering::SeqCst);
                self.in_flight.wait_idle().await;
                self.exporter.shutdown().await
            })
            .await
            .clone()
    }
}

impl fmt::Debug for SimpleLogRecordProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleLogRecordProcessor")
            .field("exporter", &self.exporter)
            .field("in_flight", &self.in_flight.count.load(Ordering::Relaxed))
            .finish()
    }
}

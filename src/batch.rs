use crate::error::{ConfigError, ErrorHandler, LogError, LogResult};
use crate::exporter::{start_export, ExportFuture, LogRecordExporter};
use crate::processor::LogRecordProcessor;
use crate::record::LogRecord;
use crate::resource::Resource;
use crate::trace::Context;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

pub const DEFAULT_MAX_EXPORT_BATCH_SIZE: usize = 512;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;
pub const DEFAULT_SCHEDULED_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_millis(30000);

/// Buffering and flushing parameters of a [`BatchLogRecordProcessor`].
///
/// **Fields**
/// - `max_export_batch_size`: most records handed to one export call.
/// - `max_queue_size`: records buffered before new ones are dropped.
/// - `scheduled_delay`: how long a partial batch may wait before it is
///   exported anyway.
/// - `export_timeout`: how long one export may take before it is
///   considered failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_export_batch_size: usize,
    pub max_queue_size: usize,
    pub scheduled_delay: Duration,
    pub export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_export_batch_size: DEFAULT_MAX_EXPORT_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            scheduled_delay: DEFAULT_SCHEDULED_DELAY,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }
}

impl BatchConfig {
    pub fn with_max_export_batch_size(mut self, size: usize) -> Self {
        self.max_export_batch_size = size;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_scheduled_delay(mut self, delay: Duration) -> Self {
        self.scheduled_delay = delay;
        self
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    /// Reject zero sizes and clamp the batch size to the queue size.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.max_export_batch_size == 0 {
            return Err(ConfigError::Zero("max_export_batch_size"));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::Zero("max_queue_size"));
        }
        if self.max_export_batch_size > self.max_queue_size {
            tracing::warn!(
                max_export_batch_size = self.max_export_batch_size,
                max_queue_size = self.max_queue_size,
                "max_export_batch_size must be smaller or equal to max_queue_size, clamping"
            );
            self.max_export_batch_size = self.max_queue_size;
        }
        Ok(self)
    }
}

/// Builder for [`BatchLogRecordProcessor`].
pub struct BatchLogRecordProcessorBuilder {
    exporter: Arc<dyn LogRecordExporter>,
    config: BatchConfig,
    error_handler: ErrorHandler,
    runtime: Option<Handle>,
}

impl BatchLogRecordProcessorBuilder {
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Runtime used for timers and exports. Defaults to the runtime the
    /// processor is built in.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<BatchLogRecordProcessor, ConfigError> {
        let config = self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| ConfigError::NoRuntime)?,
        };

        Ok(BatchLogRecordProcessor {
            inner: Arc::new(Inner {
                exporter: self.exporter,
                config,
                error_handler: self.error_handler,
                runtime,
                state: Mutex::new(State::default()),
                is_shutdown: AtomicBool::new(false),
                shutdown: OnceCell::new(),
            }),
        })
    }
}

/// Processor that buffers records and exports them in batches.
///
/// A batch is exported as soon as `max_export_batch_size` records are
/// queued, or when `scheduled_delay` has passed since the first record of
/// a partial batch arrived. At most one of these exports runs at a time;
/// records emitted meanwhile keep queueing up to `max_queue_size`, after
/// which they are dropped. Export failures go to the [`ErrorHandler`] and
/// are never retried here.
///
/// `on_emit` never blocks: timers and exports run on the Tokio runtime
/// captured when the processor is built.
#[derive(Clone)]
pub struct BatchLogRecordProcessor {
    inner: Arc<Inner>,
}

struct Inner {
    exporter: Arc<dyn LogRecordExporter>,
    config: BatchConfig,
    error_handler: ErrorHandler,
    runtime: Handle,
    state: Mutex<State>,
    is_shutdown: AtomicBool,
    shutdown: OnceCell<LogResult<()>>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Arc<LogRecord>>,
    exporting: bool,
    timer: Option<JoinHandle<()>>,
    // Bumped whenever a timer is armed so a stale one can tell it lost.
    timer_id: u64,
    dropped: u64,
}

impl State {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl BatchLogRecordProcessor {
    pub fn builder(exporter: Arc<dyn LogRecordExporter>) -> BatchLogRecordProcessorBuilder {
        BatchLogRecordProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
            error_handler: ErrorHandler::default(),
            runtime: None,
        }
    }

    /// Build a processor with the given config and the default error
    /// handler, on the current runtime.
    pub fn new(
        exporter: Arc<dyn LogRecordExporter>,
        config: BatchConfig,
    ) -> Result<Self, ConfigError> {
        Self::builder(exporter).with_config(config).build()
    }

    /// Config in force, after clamping.
    pub fn config(&self) -> BatchConfig {
        self.inner.config
    }

    /// Records currently waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Records dropped so far because the queue was full.
    pub fn dropped_records(&self) -> u64 {
        self.inner.lock().dropped
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    /// Decide what happens after the queue changed.
    ///
    /// Returns a slice to export once the lock is released; otherwise
    /// makes sure a timer is pending.
    fn maybe_start_timer(self: &Arc<Self>, state: &mut State) -> Option<Vec<Arc<LogRecord>>> {
        if state.exporting {
            return None;
        }
        if state.queue.len() >= self.config.max_export_batch_size {
            state.exporting = true;
            return Some(self.take_batch(state));
        }
        if state.timer.is_some() {
            return None;
        }

        state.timer_id = state.timer_id.wrapping_add(1);
        let id = state.timer_id;
        let delay = self.config.scheduled_delay;
        let weak: Weak<Inner> = Arc::downgrade(self);
        state.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_timer(id);
            }
        }));
        None
    }

    fn take_batch(&self, state: &mut State) -> Vec<Arc<LogRecord>> {
        state.clear_timer();
        let n = state.queue.len().min(self.config.max_export_batch_size);
        state.queue.drain(..n).collect()
    }

    fn on_timer(self: &Arc<Self>, id: u64) {
        let batch = {
            let mut state = self.lock();
            if state.timer_id != id || state.timer.is_none() {
                return;
            }
            // This task is finishing, release it without aborting.
            state.timer = None;
            if state.exporting || state.queue.is_empty() {
                return;
            }
            state.exporting = true;
            self.take_batch(&mut state)
        };
        self.run_export_cycle(batch);
    }

    /// Export `batch` with the single-flight flag held, then move on to
    /// whatever queued up in the meantime.
    fn run_export_cycle(self: &Arc<Self>, batch: Vec<Arc<LogRecord>>) {
        let export = self.export(batch);
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = export.await;
            // Release the slot before anything user-supplied runs.
            inner.on_export_complete();
            if let Err(err) = result {
                inner.error_handler.handle(err);
            }
        });
    }

    fn on_export_complete(self: &Arc<Self>) {
        let batch = {
            let mut state = self.lock();
            state.exporting = false;
            if state.queue.is_empty() || self.is_shutdown() {
                return;
            }
            state.clear_timer();
            self.maybe_start_timer(&mut state)
        };
        if let Some(batch) = batch {
            self.run_export_cycle(batch);
        }
    }

    /// Export one slice.
    ///
    /// The exporter is called right away unless some record's resource is
    /// still resolving attributes, in which case all of them are awaited
    /// first. The returned future settles when the export does or when
    /// the timeout expires, whichever comes first. Callers report the
    /// failure once their own bookkeeping is done.
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> impl Future<Output = LogResult<()>> + Send + 'static {
        let pending = pending_resources(&batch);
        let exporter = Arc::clone(&self.exporter);
        let slice = if pending.is_empty() {
            Slice::Started(start_export(&*exporter, batch))
        } else {
            Slice::Waiting { pending, batch }
        };

        let runtime = self.runtime.clone();
        let timeout = self.config.export_timeout;

        async move {
            let run = async {
                let export = match slice {
                    Slice::Started(export) => export,
                    Slice::Waiting { pending, batch } => {
                        for resource in &pending {
                            resource.wait_for_async_attributes().await;
                        }
                        start_export(&*exporter, batch)
                    }
                };
                // Detached so that a timeout leaves the exporter call running.
                runtime.spawn(export).await
            };

            match tokio::time::timeout(timeout, run).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(LogError::ExportTaskFailed(join_err.to_string())),
                Err(_) => Err(LogError::ExportTimedOut(timeout)),
            }
        }
    }

    /// Export everything queued right now, in concurrent slices.
    async fn flush_all(&self) {
        let batches: Vec<Vec<Arc<LogRecord>>> = {
            let mut state = self.lock();
            state.clear_timer();
            let mut batches = Vec::new();
            while !state.queue.is_empty() {
                let n = state.queue.len().min(self.config.max_export_batch_size);
                batches.push(state.queue.drain(..n).collect());
            }
            batches
        };

        let exports: Vec<JoinHandle<()>> = batches
            .into_iter()
            .map(|batch| {
                let export = self.export(batch);
                let handler = self.error_handler.clone();
                self.runtime.spawn(async move {
                    if let Err(err) = export.await {
                        handler.handle(err);
                    }
                })
            })
            .collect();
        for export in exports {
            let _ = export.await;
        }
    }

    async fn shutdown(&self) -> LogResult<()> {
        self.shutdown
            .get_or_init(|| async {
                self.on_shutdown();
                self.flush_all().await;
                let result = self.exporter.shutdown().await;
                tracing::debug!(ok = result.is_ok(), "batch log record processor shut down");
                result
            })
            .await
            .clone()
    }

    // Runs before the final flush. The flag flips under the state lock so
    // `on_emit` cannot queue behind the drain.
    fn on_shutdown(&self) {
        let mut state = self.lock();
        self.is_shutdown.store(true, Ordering::Release);
        state.clear_timer();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_timer();
    }
}

enum Slice {
    Started(ExportFuture),
    Waiting {
        pending: Vec<Arc<Resource>>,
        batch: Vec<Arc<LogRecord>>,
    },
}

/// Distinct resources of `batch` whose attributes are still resolving.
pub(crate) fn pending_resources(batch: &[Arc<LogRecord>]) -> Vec<Arc<Resource>> {
    let mut pending: Vec<Arc<Resource>> = Vec::new();
    for record in batch {
        let resource = record.resource();
        if resource.async_attributes_pending() && !pending.iter().any(|r| Arc::ptr_eq(r, resource)) {
            pending.push(Arc::clone(resource));
        }
    }
    pending
}

#[async_trait]
impl LogRecordProcessor for BatchLogRecordProcessor {
    fn on_emit(&self, record: &Arc<LogRecord>, _context: &Context) {
        let inner = &self.inner;
        if inner.is_shutdown() {
            return;
        }

        let batch = {
            let mut state = inner.lock();
            if inner.is_shutdown() {
                return;
            }
            if state.queue.len() >= inner.config.max_queue_size {
                state.dropped += 1;
                if state.dropped == 1 {
                    tracing::debug!(
                        max_queue_size = inner.config.max_queue_size,
                        "log record queue is full, dropping records"
                    );
                }
                return;
            }
            state.queue.push_back(Arc::clone(record));
            inner.maybe_start_timer(&mut state)
        };

        if let Some(batch) = batch {
            inner.run_export_cycle(batch);
        }
    }

    async fn force_flush(&self) -> LogResult<()> {
        if self.inner.is_shutdown() {
            return self.inner.shutdown().await;
        }
        self.inner.flush_all().await;
        Ok(())
    }

    async fn shutdown(&self) -> LogResult<()> {
        self.inner.shutdown().await
    }
}

impl fmt::Debug for BatchLogRecordProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLogRecordProcessor")
            .field("exporter", &self.inner.exporter)
            .field("config", &self.inner.config)
            .field("is_shutdown", &self.inner.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Attributes;
    use crate::testing::{bodies, capturing_handler, record, record_with_resource, settle, Mode, TestExporter};
    use crate::value::AnyValue;
    use tokio::time::sleep;

    fn processor(exporter: &Arc<TestExporter>, config: BatchConfig) -> BatchLogRecordProcessor {
        BatchLogRecordProcessor::new(exporter.clone(), config).unwrap()
    }

    fn emit_n(p: &BatchLogRecordProcessor, range: std::ops::Range<usize>) {
        let cx = Context::new();
        for i in range {
            p.on_emit(&record(&i.to_string()), &cx);
        }
    }

    fn expected(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| i.to_string()).collect()
    }

    #[test]
    fn config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.max_export_batch_size, 512);
        assert_eq!(config.max_queue_size, 2048);
        assert_eq!(config.scheduled_delay, Duration::from_millis(5000));
        assert_eq!(config.export_timeout, Duration::from_millis(30000));
    }

    #[test]
    fn batch_size_is_clamped_to_queue_size() {
        let config = BatchConfig::default()
            .with_max_queue_size(10)
            .with_max_export_batch_size(20)
            .validate()
            .unwrap();
        assert_eq!(config.max_export_batch_size, 10);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = BatchConfig::default().with_max_queue_size(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::Zero("max_queue_size"));
        let err = BatchConfig::default().with_max_export_batch_size(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::Zero("max_export_batch_size"));
    }

    #[test]
    fn build_without_runtime_fails() {
        let exporter = TestExporter::new(Mode::Succeed);
        let err = BatchLogRecordProcessor::new(exporter, BatchConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::NoRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_is_exported_in_the_same_call() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default().with_max_export_batch_size(5));

        emit_n(&p, 0..4);
        assert_eq!(exporter.calls(), 0);

        emit_n(&p, 4..5);
        assert_eq!(exporter.batch_sizes(), vec![5]);
        assert_eq!(p.queue_len(), 0);

        // no timer is left behind for an empty queue
        sleep(Duration::from_secs(10)).await;
        assert_eq!(exporter.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_waits_for_the_scheduled_delay() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default());

        emit_n(&p, 0..3);
        settle().await;
        assert_eq!(exporter.calls(), 0);

        sleep(Duration::from_millis(4990)).await;
        assert_eq!(exporter.calls(), 0);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(exporter.batch_sizes(), vec![3]);
        assert_eq!(bodies(&exporter.exported()), expected(0..3));
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_bypasses_a_pending_timer() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(
            &exporter,
            BatchConfig::default()
                .with_max_export_batch_size(5)
                .with_scheduled_delay(Duration::from_secs(5)),
        );

        emit_n(&p, 0..3);
        sleep(Duration::from_secs(4)).await;
        emit_n(&p, 3..5);
        assert_eq!(exporter.batch_sizes(), vec![5]);

        // the old timer would have fired at 5s
        sleep(Duration::from_secs(2)).await;
        assert_eq!(exporter.calls(), 1);

        // a new partial batch gets a fresh full delay
        emit_n(&p, 5..6);
        sleep(Duration::from_millis(4990)).await;
        assert_eq!(exporter.calls(), 1);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(exporter.batch_sizes(), vec![5, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_export_in_flight() {
        let exporter = TestExporter::new(Mode::Gated);
        let p = processor(
            &exporter,
            BatchConfig::default()
                .with_max_export_batch_size(5)
                .with_max_queue_size(6),
        );

        emit_n(&p, 0..50);
        assert_eq!(exporter.batch_sizes(), vec![5]);
        assert_eq!(p.queue_len(), 6);
        assert_eq!(p.dropped_records(), 39);

        settle().await;
        assert_eq!(exporter.calls(), 1);

        exporter.release(Ok(()));
        settle().await;
        assert_eq!(exporter.batch_sizes(), vec![5, 5]);
        assert_eq!(p.queue_len(), 1);

        exporter.release(Ok(()));
        settle().await;
        // last record waits for the timer
        assert_eq!(exporter.calls(), 2);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(exporter.batch_sizes(), vec![5, 5, 1]);
        exporter.release(Ok(()));

        assert_eq!(bodies(&exporter.exported()), expected(0..11));
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_exported_in_emission_order() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default().with_max_export_batch_size(10));

        emit_n(&p, 0..95);
        p.force_flush().await.unwrap();

        assert_eq!(bodies(&exporter.exported()), expected(0..95));
        assert!(exporter.batch_sizes().iter().all(|n| *n <= 10));
    }

    #[tokio::test(start_paused = true)]
    async fn force_flush_exports_everything_queued() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default().with_max_export_batch_size(100));

        emit_n(&p, 0..250);
        assert_eq!(exporter.batch_sizes(), vec![100]);
        p.force_flush().await.unwrap();

        assert_eq!(p.queue_len(), 0);
        let mut got = bodies(&exporter.exported());
        got.sort();
        let mut want = expected(0..250);
        want.sort();
        assert_eq!(got, want);
        assert_eq!(exporter.batch_sizes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_never_grows_past_capacity() {
        let exporter = TestExporter::new(Mode::Gated);
        let p = processor(
            &exporter,
            BatchConfig::default()
                .with_max_export_batch_size(5)
                .with_max_queue_size(8),
        );

        for i in 0..30 {
            p.on_emit(&record(&i.to_string()), &Context::new());
            assert!(p.queue_len() <= 8);
        }
        assert_eq!(p.dropped_records(), 30 - 5 - 8);

        let flush = tokio::spawn({
            let p = p.clone();
            async move { p.force_flush().await }
        });
        settle().await;
        exporter.release(Ok(()));
        exporter.release(Ok(()));
        exporter.release(Ok(()));
        flush.await.unwrap().unwrap();

        assert_eq!(exporter.exported().len(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_exports_are_reported_once_and_not_retried() {
        let exporter = TestExporter::new(Mode::Fail);
        let (handler, errors) = capturing_handler();
        let p = BatchLogRecordProcessor::builder(exporter.clone())
            .with_config(BatchConfig::default().with_max_export_batch_size(2))
            .with_error_handler(handler)
            .build()
            .unwrap();

        emit_n(&p, 0..2);
        settle().await;

        assert_eq!(exporter.calls(), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LogError::ExportFailed(_)));
        assert_eq!(p.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_error_handler_does_not_stall_exports() {
        let exporter = TestExporter::new(Mode::Fail);
        let p = BatchLogRecordProcessor::builder(exporter.clone())
            .with_config(BatchConfig::default().with_max_export_batch_size(2))
            .with_error_handler(ErrorHandler::new(|_| panic!("handler bug")))
            .build()
            .unwrap();

        emit_n(&p, 0..2);
        settle().await;
        emit_n(&p, 2..6);
        sleep(Duration::from_secs(30)).await;

        assert_eq!(exporter.calls(), 3);
        assert_eq!(p.queue_len(), 0);
        assert_eq!(bodies(&exporter.exported()), expected(0..6));

        p.force_flush().await.unwrap();
        p.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn force_flush_swallows_export_errors() {
        let exporter = TestExporter::new(Mode::Fail);
        let (handler, errors) = capturing_handler();
        let p = BatchLogRecordProcessor::builder(exporter.clone())
            .with_error_handler(handler)
            .build()
            .unwrap();

        emit_n(&p, 0..3);
        assert!(p.force_flush().await.is_ok());
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn export_timeout_frees_the_slot_and_ignores_late_results() {
        let exporter = TestExporter::new(Mode::Gated);
        let (handler, errors) = capturing_handler();
        let p = BatchLogRecordProcessor::builder(exporter.clone())
            .with_config(
                BatchConfig::default()
                    .with_max_export_batch_size(2)
                    .with_export_timeout(Duration::from_millis(100)),
            )
            .with_error_handler(handler)
            .build()
            .unwrap();

        emit_n(&p, 0..2);
        sleep(Duration::from_millis(150)).await;
        {
            let errors = errors.lock().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], LogError::ExportTimedOut(_)));
        }

        emit_n(&p, 2..4);
        assert_eq!(exporter.calls(), 2);

        // the first export resolving late changes nothing
        exporter.release(Err(LogError::export_failed("late")));
        exporter.release(Ok(()));
        settle().await;
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert_eq!(exporter.exported().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent() {
        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default());

        emit_n(&p, 0..3);
        p.shutdown().await.unwrap();
        p.shutdown().await.unwrap();

        assert_eq!(exporter.shutdowns(), 1);
        assert_eq!(bodies(&exporter.exported()), expected(0..3));

        // later records are discarded, flush short-circuits
        emit_n(&p, 3..10);
        assert_eq!(p.queue_len(), 0);
        p.force_flush().await.unwrap();
        assert_eq!(exporter.exported().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn records_racing_shutdown_are_never_stranded() {
        let exporter = crate::memory::InMemoryLogRecordExporter::new();
        let (handler, errors) = capturing_handler();
        let p = BatchLogRecordProcessor::builder(Arc::new(exporter.clone()))
            .with_config(BatchConfig::default().with_max_queue_size(100_000))
            .with_error_handler(handler)
            .build()
            .unwrap();

        let emitter = tokio::task::spawn_blocking({
            let p = p.clone();
            move || {
                let cx = Context::new();
                for i in 0..20_000 {
                    p.on_emit(&record(&i.to_string()), &cx);
                }
            }
        });
        tokio::task::yield_now().await;
        p.shutdown().await.unwrap();
        emitter.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(p.queue_len(), 0);
        assert!(errors.lock().unwrap().is_empty(), "export after exporter shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_failure_is_replayed() {
        let exporter = TestExporter::new(Mode::Succeed);
        exporter.fail_shutdown_with(LogError::shutdown_failed("socket closed"));
        let p = processor(&exporter, BatchConfig::default());

        let first = p.shutdown().await.unwrap_err();
        let second = p.shutdown().await.unwrap_err();
        let flush = p.force_flush().await.unwrap_err();

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.to_string(), flush.to_string());
        assert_eq!(exporter.shutdowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_pending_resource_attributes() {
        let resource = Resource::with_async_attributes(Attributes::new(), async {
            sleep(Duration::from_secs(1)).await;
            let mut detected = Attributes::new();
            detected.insert("host.name".to_string(), AnyValue::from("node-7"));
            Ok(detected)
        });

        let exporter = TestExporter::new(Mode::Succeed);
        let p = processor(&exporter, BatchConfig::default().with_max_export_batch_size(1));

        p.on_emit(&record_with_resource("a", resource), &Context::new());
        settle().await;
        assert_eq!(exporter.calls(), 0);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(exporter.calls(), 1);
        let exported = exporter.exported();
        assert_eq!(
            exported[0].resource().get("host.name"),
            Some(AnyValue::from("node-7"))
        );
    }

    #[test]
    fn pending_resources_are_deduplicated() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let shared = Resource::with_async_attributes(Attributes::new(), std::future::pending());
        let batch = vec![
            record_with_resource("a", shared.clone()),
            record_with_resource("b", shared.clone()),
            record("c"),
        ];
        let pending = pending_resources(&batch);
        assert_eq!(pending.len(), 1);
        assert!(Arc::ptr_eq(&pending[0], &shared));
    }
}

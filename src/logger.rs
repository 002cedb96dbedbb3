//! Entry points applications log through.
//!
//! A [`LoggerProvider`] owns the resource, the record limits and the
//! processors. [`Logger`]s handed out by it are cheap to clone and build
//! one [`LogRecord`] per call, give it to the processors, then seal it.

use crate::error::{LogError, LogResult};
use crate::multi::{MultiLogRecordProcessor, DEFAULT_FORCE_FLUSH_TIMEOUT};
use crate::processor::{EnabledOptions, LogRecordProcessor};
use crate::record::{LogRecord, LogRecordLimits, LogRecordParams};
use crate::resource::{InstrumentationScope, Resource};
use crate::severity::Severity;
use crate::trace::Context;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Filters applied by every logger before a record is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoggerConfig {
    /// Records with a known severity below this are discarded.
    pub min_severity: Option<Severity>,
    /// Discard records whose context carries an unsampled trace.
    pub trace_based: bool,
}

impl LoggerConfig {
    fn allows(&self, severity: Option<Severity>, context: &Context) -> bool {
        if let (Some(min), Some(severity)) = (self.min_severity, severity) {
            if severity < min {
                return false;
            }
        }
        if self.trace_based {
            if let Some(trace) = context.trace {
                return trace.is_sampled();
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct LoggerProviderBuilder {
    resource: Arc<Resource>,
    limits: LogRecordLimits,
    processors: Vec<Arc<dyn LogRecordProcessor>>,
    force_flush_timeout: Duration,
    logger_config: LoggerConfig,
}

impl LoggerProviderBuilder {
    pub fn with_resource(mut self, resource: impl Into<Arc<Resource>>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn with_limits(mut self, limits: LogRecordLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Add a processor. Processors see records in the order they were added.
    pub fn with_processor(mut self, processor: impl LogRecordProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn with_shared_processor(mut self, processor: Arc<dyn LogRecordProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn with_force_flush_timeout(mut self, timeout: Duration) -> Self {
        self.force_flush_timeout = timeout;
        self
    }

    pub fn with_logger_config(mut self, config: LoggerConfig) -> Self {
        self.logger_config = config;
        self
    }

    pub fn build(self) -> LoggerProvider {
        LoggerProvider {
            inner: Arc::new(ProviderInner {
                resource: self.resource,
                limits: self.limits,
                processor: MultiLogRecordProcessor::with_timeout(
                    self.processors,
                    self.force_flush_timeout,
                ),
                logger_config: self.logger_config,
                is_shutdown: AtomicBool::new(false),
                shutdown: OnceCell::new(),
            }),
        }
    }
}

/// Owner of the processing pipeline.
///
/// Clones share the same pipeline. Once [`shutdown`](Self::shutdown) has
/// been called every logger created from it silently drops records.
#[derive(Clone)]
pub struct LoggerProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    resource: Arc<Resource>,
    limits: LogRecordLimits,
    processor: MultiLogRecordProcessor,
    logger_config: LoggerConfig,
    is_shutdown: AtomicBool,
    shutdown: OnceCell<LogResult<()>>,
}

impl LoggerProvider {
    pub fn builder() -> LoggerProviderBuilder {
        LoggerProviderBuilder {
            resource: Arc::new(Resource::empty()),
            limits: LogRecordLimits::default(),
            processors: Vec::new(),
            force_flush_timeout: DEFAULT_FORCE_FLUSH_TIMEOUT,
            logger_config: LoggerConfig::default(),
        }
    }

    /// Logger for the given instrumentation scope.
    pub fn logger(&self, scope: InstrumentationScope) -> Logger {
        Logger {
            scope: Arc::new(scope),
            provider: Arc::clone(&self.inner),
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.inner.resource
    }

    pub fn limits(&self) -> LogRecordLimits {
        self.inner.limits
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Acquire)
    }

    /// Flush every processor, bounded by the provider's flush timeout.
    pub async fn force_flush(&self) -> LogResult<()> {
        if self.is_shutdown() {
            return Err(LogError::AlreadyShutdown);
        }
        self.inner.processor.force_flush().await
    }

    /// Shut every processor down. Safe to call more than once; later
    /// calls warn and return the outcome of the first.
    pub async fn shutdown(&self) -> LogResult<()> {
        if self.inner.is_shutdown.swap(true, Ordering::AcqRel) {
            tracing::warn!("logger provider shutdown called more than once");
        }
        self.inner
            .shutdown
            .get_or_init(|| async {
                tracing::debug!("shutting down logger provider");
                self.inner.processor.shutdown().await
            })
            .await
            .clone()
    }
}

impl fmt::Debug for LoggerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerProvider")
            .field("resource", &self.inner.resource)
            .field("limits", &self.inner.limits)
            .field("processors", &self.inner.processor.processors().len())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Handle used at call sites to emit records.
#[derive(Clone)]
pub struct Logger {
    scope: Arc<InstrumentationScope>,
    provider: Arc<ProviderInner>,
}

impl Logger {
    pub fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Emit a record without ambient context.
    pub fn emit(&self, params: LogRecordParams) {
        self.emit_with_context(params, &Context::new());
    }

    /// Emit a record. Trace linkage missing from `params` is taken from
    /// `context`.
    ///
    /// The record is sealed once every processor has seen it.
    pub fn emit_with_context(&self, mut params: LogRecordParams, context: &Context) {
        let provider = &self.provider;
        if provider.is_shutdown.load(Ordering::Acquire) {
            return;
        }
        if !provider.logger_config.allows(params.severity_number, context) {
            return;
        }
        if params.trace_context.is_none() {
            params.trace_context = context.trace;
        }

        let record = Arc::new(LogRecord::new(
            Arc::clone(&self.scope),
            Arc::clone(&provider.resource),
            provider.limits,
            params,
        ));
        provider.processor.on_emit(&record, context);
        record.make_read_only();
    }

    /// Whether a record with these properties would reach any processor.
    pub fn enabled(&self, severity: Option<Severity>, event_name: Option<&str>, context: &Context) -> bool {
        let provider = &self.provider;
        if provider.is_shutdown.load(Ordering::Acquire) {
            return false;
        }
        if !provider.logger_config.allows(severity, context) {
            return false;
        }
        provider.processor.enabled(&EnabledOptions {
            context,
            scope: &self.scope,
            severity,
            event_name,
        })
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("scope", &self.scope).finish()
    }
}

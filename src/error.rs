use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Boxed error type used by exporters, matching what backends usually
/// hand back (network errors, serialization errors, ...).
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result alias used across the pipeline.
pub type LogResult<T> = Result<T, LogError>;

/// Errors produced while exporting, flushing or shutting down.
///
/// `LogError` is `Clone` so an idempotent shutdown can hand the same
/// outcome to every caller.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LogError {
    /// The exporter reported a failure for a batch.
    #[error("log record export failed: {0}")]
    ExportFailed(#[source] Arc<dyn Error + Send + Sync + 'static>),

    /// The exporter did not settle within the export timeout.
    #[error("log record export timed out after {0:?}")]
    ExportTimedOut(Duration),

    /// The export task panicked or was cancelled by the runtime.
    #[error("log record export task failed: {0}")]
    ExportTaskFailed(String),

    /// A flush or shutdown fan-out did not settle within its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Asynchronous resource attributes failed to resolve.
    #[error("resource attribute detection failed: {0}")]
    ResourceDetection(#[source] Arc<dyn Error + Send + Sync + 'static>),

    /// The exporter failed to shut down.
    #[error("exporter shutdown failed: {0}")]
    ShutdownFailed(#[source] Arc<dyn Error + Send + Sync + 'static>),

    /// The component was already shut down.
    #[error("already shut down")]
    AlreadyShutdown,
}

impl LogError {
    pub fn export_failed(err: impl Into<BoxError>) -> Self {
        LogError::ExportFailed(Arc::from(err.into()))
    }

    pub fn shutdown_failed(err: impl Into<BoxError>) -> Self {
        LogError::ShutdownFailed(Arc::from(err.into()))
    }
}

/// Error returned when a configuration value is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("unknown or unsupported exporter: {0}")]
    UnknownExporter(String),

    #[error("exporter not enabled in this build: {0}")]
    ExporterDisabled(&'static str),

    #[error("no Tokio runtime available to run background exports")]
    NoRuntime,
}

/// Process-wide sink for pipeline failures that must never reach the
/// code that emitted the log record.
///
/// Processors receive a handler when they are built; the default one
/// reports through `tracing::error!`. Tests pass a capturing closure.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(LogError) + Send + Sync>);

impl ErrorHandler {
    pub fn new(f: impl Fn(LogError) + Send + Sync + 'static) -> Self {
        ErrorHandler(Arc::new(f))
    }

    /// Report `err`. A panicking handler is contained here so it cannot
    /// take down the task that hit the error.
    pub fn handle(&self, err: LogError) {
        if panic::catch_unwind(AssertUnwindSafe(|| (self.0)(err))).is_err() {
            tracing::error!("log pipeline error handler panicked");
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        ErrorHandler::new(|err| tracing::error!(error = %err, "log pipeline error"))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler").finish_non_exhaustive()
    }
}

use crate::error::LogResult;
use crate::record::LogRecord;
use crate::resource::InstrumentationScope;
use crate::severity::Severity;
use crate::trace::Context;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// What a logger call site knows before it builds a record.
#[derive(Debug, Clone, Copy)]
pub struct EnabledOptions<'a> {
    pub context: &'a Context,
    pub scope: &'a InstrumentationScope,
    pub severity: Option<Severity>,
    pub event_name: Option<&'a str>,
}

/// Receives records as they are emitted and forwards them somewhere.
///
/// `on_emit` is called synchronously on the logging thread and must not
/// block; the record is still mutable during the call and sealed right
/// after it returns. Processors that keep the record clone the `Arc`.
#[async_trait]
pub trait LogRecordProcessor: Send + Sync + Debug {
    fn on_emit(&self, record: &Arc<LogRecord>, context: &Context);

    /// Export everything buffered so far.
    async fn force_flush(&self) -> LogResult<()>;

    /// Flush and release the processor. Repeated calls return the
    /// outcome of the first one.
    async fn shutdown(&self) -> LogResult<()>;

    /// Whether a record with these properties would be consumed.
    ///
    /// Processors without an opinion keep the default and are always
    /// enabled.
    fn enabled(&self, _options: &EnabledOptions<'_>) -> bool {
        true
    }
}

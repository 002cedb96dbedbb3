use crate::logger::Logger;
use crate::record::LogRecordParams;
use crate::severity::Severity;
use crate::trace::Context;
use crate::value::AnyValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{self, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events whose target starts with this come from the pipeline itself
/// and are never bridged.
const OWN_TARGET: &str = "log_pipeline";

/// `tracing_subscriber` layer turning `tracing` events into log records
/// emitted through a [`Logger`].
///
/// The `message` field becomes the body, every other field an attribute.
/// The event level maps to a [`Severity`] and the callsite metadata is
/// attached as `target`, `module_path`, `file` and `line`.
#[derive(Debug)]
pub struct LogBridgeLayer {
    logger: Logger,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the logger.
    pub emitted_events: Arc<AtomicU64>,
    /// Events skipped because they came from this crate or were disabled.
    pub ignored_events: Arc<AtomicU64>,
}

impl LogBridgeLayer {
    pub fn new(logger: Logger) -> Self {
        LogBridgeLayer {
            logger,
            total_events: Arc::new(AtomicU64::new(0)),
            emitted_events: Arc::new(AtomicU64::new(0)),
            ignored_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let severity = Severity::from(*meta.level());
        let context = Context::new();
        if meta.target().starts_with(OWN_TARGET)
            || !self.logger.enabled(Some(severity), None, &context)
        {
            self.ignored_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut params = LogRecordParams::new().with_severity(severity);
        let mut visitor = FieldVisitor {
            params: &mut params,
        };
        event.record(&mut visitor);

        params = params.with_attribute("target", meta.target());
        if let Some(module_path) = meta.module_path() {
            params = params.with_attribute("module_path", module_path);
        }
        if let Some(file) = meta.file() {
            params = params.with_attribute("file", file);
        }
        if let Some(line) = meta.line() {
            params = params.with_attribute("line", line);
        }

        self.logger.emit_with_context(params, &context);
        self.emitted_events.fetch_add(1, Ordering::Relaxed);
    }
}

struct FieldVisitor<'a> {
    params: &'a mut LogRecordParams,
}

impl FieldVisitor<'_> {
    fn put(&mut self, field: &Field, value: AnyValue) {
        if field.name() == "message" {
            self.params.body = Some(value);
        } else {
            self.params.attributes.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, AnyValue::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, AnyValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = match i64::try_from(value) {
            Ok(v) => AnyValue::Int(v),
            Err(_) => AnyValue::String(value.to_string()),
        };
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, AnyValue::Double(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, AnyValue::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, AnyValue::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, AnyValue::String(format!("{:?}", value)));
    }
}

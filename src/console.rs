use crate::error::LogError;
use crate::exporter::{ExportFuture, LogRecordExporter};
use crate::record::LogRecord;
use crate::resource::Attributes;
use crate::severity::Severity;
use crate::trace::{SpanId, TraceId};
use crate::value::AnyValue;
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Exporter printing one JSON object per record.
///
/// Writes to stdout unless built with [`with_writer`](Self::with_writer).
/// Writing happens synchronously inside `export`, so lines from one batch
/// are never interleaved with another batch.
pub struct ConsoleLogRecordExporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleLogRecordExporter {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        ConsoleLogRecordExporter {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_batch(&self, batch: &[Arc<LogRecord>]) -> Result<(), LogError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for record in batch {
            let line = serde_json::to_string(&ConsoleLine::from_record(record))
                .map_err(LogError::export_failed)?;
            writeln!(writer, "{}", line).map_err(LogError::export_failed)?;
        }
        writer.flush().map_err(LogError::export_failed)
    }
}

impl Default for ConsoleLogRecordExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConsoleLogRecordExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleLogRecordExporter").finish_non_exhaustive()
    }
}

impl LogRecordExporter for ConsoleLogRecordExporter {
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> ExportFuture {
        let result = self.write_batch(&batch);
        Box::pin(async move { result })
    }
}

/// Flat shape of one printed line.
#[derive(Serialize)]
struct ConsoleLine {
    timestamp: String,
    observed_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity_number: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<AnyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<TraceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    span_id: Option<SpanId>,
    attributes: Attributes,
    #[serde(skip_serializing_if = "is_zero")]
    dropped_attributes_count: u32,
    scope: String,
    resource: Attributes,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl ConsoleLine {
    fn from_record(record: &LogRecord) -> Self {
        let trace = record.trace_context();
        ConsoleLine {
            timestamp: record.timestamp().to_rfc3339(),
            observed_timestamp: record.observed_timestamp().to_rfc3339(),
            severity_number: record.severity_number(),
            severity_text: record.severity_text(),
            body: record.body(),
            event_name: record.event_name(),
            trace_id: trace.map(|t| t.trace_id),
            span_id: trace.map(|t| t.span_id),
            attributes: record.attributes(),
            dropped_attributes_count: record.dropped_attributes_count(),
            scope: record.instrumentation_scope().name.clone(),
            resource: record.resource().attributes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LogRecordLimits, LogRecordParams};
    use crate::resource::{InstrumentationScope, Resource};
    use crate::trace::{TraceContext, TraceFlags};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    #[tokio::test]
    async fn prints_one_json_line_per_record() {
        let buf = SharedBuf::default();
        let exporter = ConsoleLogRecordExporter::with_writer(buf.clone());

        let mut resource = Attributes::new();
        resource.insert("service.name".into(), "checkout".into());
        let trace = TraceContext::new(TraceId([1; 16]), SpanId([2; 8]), TraceFlags::SAMPLED);
        let record = Arc::new(LogRecord::new(
            Arc::new(InstrumentationScope::new("console-test")),
            Arc::new(Resource::new(resource)),
            LogRecordLimits::default(),
            LogRecordParams::new()
                .with_body("payment accepted")
                .with_severity(Severity::Info)
                .with_trace_context(trace)
                .with_attribute("order.id", 42),
        ));

        exporter.export(vec![Arc::clone(&record), record]).await.unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        let line = &lines[0];
        assert_eq!(line["body"], "payment accepted");
        assert_eq!(line["severity_number"], 9);
        assert_eq!(line["severity_text"], "INFO");
        assert_eq!(line["attributes"]["order.id"], 42);
        assert_eq!(line["scope"], "console-test");
        assert_eq!(line["resource"]["service.name"], "checkout");
        assert_eq!(line["trace_id"], "01010101010101010101010101010101");
        assert!(line.get("dropped_attributes_count").is_none());
    }
}

use crate::resource::{Attributes, InstrumentationScope, Resource};
use crate::severity::Severity;
use crate::trace::TraceContext;
use crate::value::{self, AnyValue};
use chrono::{DateTime, Utc};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Limits applied to the attributes of every record a logger creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordLimits {
    /// Maximum number of distinct attribute keys.
    pub attribute_count_limit: usize,
    /// Maximum length, in characters, of string attribute values.
    /// `None` means unlimited.
    pub attribute_value_length_limit: Option<usize>,
}

impl Default for LogRecordLimits {
    fn default() -> Self {
        Self {
            attribute_count_limit: 128,
            attribute_value_length_limit: None,
        }
    }
}

/// Caller-supplied fields for a record about to be emitted.
#[derive(Debug, Clone, Default)]
pub struct LogRecordParams {
    pub timestamp: Option<DateTime<Utc>>,
    pub observed_timestamp: Option<DateTime<Utc>>,
    pub trace_context: Option<TraceContext>,
    pub severity_number: Option<Severity>,
    pub severity_text: Option<String>,
    pub body: Option<AnyValue>,
    pub event_name: Option<String>,
    pub attributes: Vec<(String, AnyValue)>,
}

impl LogRecordParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<AnyValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity_number = Some(severity);
        self.severity_text = Some(severity.name().to_string());
        self
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_trace_context(mut self, trace_context: TraceContext) -> Self {
        self.trace_context = Some(trace_context);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Fields {
    severity_number: Option<Severity>,
    severity_text: Option<String>,
    body: Option<AnyValue>,
    event_name: Option<String>,
    attributes: Attributes,
    dropped_attributes_count: u32,
}

/// A structured log event.
///
/// A record is mutable until the logger hands it to the active processor
/// and calls [`LogRecord::make_read_only`]. From then on every setter is a
/// no-op that logs a warning, while processors still holding the record
/// can keep reading it.
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    observed_timestamp: DateTime<Utc>,
    trace_context: Option<TraceContext>,
    scope: Arc<InstrumentationScope>,
    resource: Arc<Resource>,
    limits: LogRecordLimits,
    fields: RwLock<Fields>,
    read_only: AtomicBool,
}

impl LogRecord {
    pub fn new(
        scope: Arc<InstrumentationScope>,
        resource: Arc<Resource>,
        limits: LogRecordLimits,
        params: LogRecordParams,
    ) -> Self {
        let now = Utc::now();
        let record = LogRecord {
            timestamp: params.timestamp.unwrap_or(now),
            observed_timestamp: params.observed_timestamp.unwrap_or(now),
            trace_context: params.trace_context,
            scope,
            resource,
            limits,
            fields: RwLock::new(Fields {
                severity_number: params.severity_number,
                severity_text: params.severity_text,
                body: params.body,
                event_name: params.event_name,
                ..Fields::default()
            }),
            read_only: AtomicBool::new(false),
        };
        record.set_attributes(params.attributes);
        record
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn observed_timestamp(&self) -> DateTime<Utc> {
        self.observed_timestamp
    }

    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    pub fn instrumentation_scope(&self) -> &Arc<InstrumentationScope> {
        &self.scope
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn limits(&self) -> LogRecordLimits {
        self.limits
    }

    pub fn severity_number(&self) -> Option<Severity> {
        self.read().severity_number
    }

    pub fn severity_text(&self) -> Option<String> {
        self.read().severity_text.clone()
    }

    pub fn body(&self) -> Option<AnyValue> {
        self.read().body.clone()
    }

    pub fn event_name(&self) -> Option<String> {
        self.read().event_name.clone()
    }

    pub fn attributes(&self) -> Attributes {
        self.read().attributes.clone()
    }

    pub fn attribute(&self, key: &str) -> Option<AnyValue> {
        self.read().attributes.get(key).cloned()
    }

    pub fn dropped_attributes_count(&self) -> u32 {
        self.read().dropped_attributes_count
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Seal the record. Irreversible.
    pub fn make_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AnyValue>) -> &Self {
        let Some(mut fields) = self.write() else {
            return self;
        };
        let key = key.into();
        let value = value.into();

        if key.is_empty() {
            tracing::warn!("invalid attribute key: empty string");
            return self;
        }
        if !value::is_valid_attribute_value(&value) {
            tracing::warn!(key = %key, "invalid attribute value set for key");
            return self;
        }
        if fields.attributes.len() >= self.limits.attribute_count_limit
            && !fields.attributes.contains_key(&key)
        {
            fields.dropped_attributes_count += 1;
            if fields.dropped_attributes_count == 1 {
                tracing::warn!("dropping extra attributes");
            }
            return self;
        }

        let value = match self.limits.attribute_value_length_limit {
            Some(limit) => value::truncate(value, limit),
            None => value,
        };
        fields.attributes.insert(key, value);
        self
    }

    pub fn set_attributes<K, V>(&self, attributes: impl IntoIterator<Item = (K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<AnyValue>,
    {
        for (k, v) in attributes {
            self.set_attribute(k, v);
        }
        self
    }

    pub fn set_body(&self, body: impl Into<AnyValue>) -> &Self {
        if let Some(mut fields) = self.write() {
            fields.body = Some(body.into());
        }
        self
    }

    pub fn set_severity_number(&self, severity: Severity) -> &Self {
        if let Some(mut fields) = self.write() {
            fields.severity_number = Some(severity);
        }
        self
    }

    pub fn set_severity_text(&self, text: impl Into<String>) -> &Self {
        if let Some(mut fields) = self.write() {
            fields.severity_text = Some(text.into());
        }
        self
    }

    pub fn set_event_name(&self, name: impl Into<String>) -> &Self {
        if let Some(mut fields) = self.write() {
            fields.event_name = Some(name.into());
        }
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Fields> {
        self.fields.read().unwrap_or_else(PoisonError::into_inner)
    }

    // `None` once the record is sealed.
    fn write(&self) -> Option<RwLockWriteGuard<'_, Fields>> {
        if self.is_read_only() {
            tracing::warn!("can not mutate a log record that has already been emitted");
            return None;
        }
        Some(self.fields.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.read();
        f.debug_struct("LogRecord")
            .field("timestamp", &self.timestamp)
            .field("observed_timestamp", &self.observed_timestamp)
            .field("trace_context", &self.trace_context)
            .field("severity_number", &fields.severity_number)
            .field("severity_text", &fields.severity_text)
            .field("body", &fields.body)
            .field("event_name", &fields.event_name)
            .field("attributes", &fields.attributes)
            .field("dropped_attributes_count", &fields.dropped_attributes_count)
            .field("scope", &self.scope)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.read();
        let mut s = serializer.serialize_struct("LogRecord", 11)?;
        s.serialize_field("timestamp", &self.timestamp)?;
        s.serialize_field("observed_timestamp", &self.observed_timestamp)?;
        s.serialize_field("trace_context", &self.trace_context)?;
        s.serialize_field("severity_number", &fields.severity_number)?;
        s.serialize_field("severity_text", &fields.severity_text)?;
        s.serialize_field("body", &fields.body)?;
        s.serialize_field("event_name", &fields.event_name)?;
        s.serialize_field("attributes", &fields.attributes)?;
        s.serialize_field("dropped_attributes_count", &fields.dropped_attributes_count)?;
        s.serialize_field("instrumentation_scope", &*self.scope)?;
        s.serialize_field("resource", &*self.resource)?;
        s.end()
    }
}

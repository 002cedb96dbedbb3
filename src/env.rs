//! Environment variable names understood by this crate, and helpers
//! reading them into configuration values.
//!
//! These are purely helpers; processors and loggers never touch the
//! environment themselves. Unparsable values are reported with a warning
//! and the default is used instead.

use crate::batch::BatchConfig;
use crate::record::LogRecordLimits;
use std::str::FromStr;
use std::time::Duration;

/// Maximum number of records per export batch.
pub const OTEL_BLRP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BLRP_MAX_EXPORT_BATCH_SIZE";

/// Maximum number of records buffered by a batch processor.
pub const OTEL_BLRP_MAX_QUEUE_SIZE: &str = "OTEL_BLRP_MAX_QUEUE_SIZE";

/// Delay, in milliseconds, before a partial batch is exported.
pub const OTEL_BLRP_SCHEDULE_DELAY: &str = "OTEL_BLRP_SCHEDULE_DELAY";

/// Export timeout, in milliseconds.
pub const OTEL_BLRP_EXPORT_TIMEOUT: &str = "OTEL_BLRP_EXPORT_TIMEOUT";

/// Maximum number of attributes per record.
pub const OTEL_LOGRECORD_ATTRIBUTE_COUNT_LIMIT: &str = "OTEL_LOGRECORD_ATTRIBUTE_COUNT_LIMIT";

/// Generic attribute count limit, used when the record-specific one is unset.
pub const OTEL_ATTRIBUTE_COUNT_LIMIT: &str = "OTEL_ATTRIBUTE_COUNT_LIMIT";

/// Maximum length of string attribute values.
pub const OTEL_LOGRECORD_ATTRIBUTE_VALUE_LENGTH_LIMIT: &str =
    "OTEL_LOGRECORD_ATTRIBUTE_VALUE_LENGTH_LIMIT";

/// Generic value length limit, used when the record-specific one is unset.
pub const OTEL_ATTRIBUTE_VALUE_LENGTH_LIMIT: &str = "OTEL_ATTRIBUTE_VALUE_LENGTH_LIMIT";

/// Exporter selection, see [`ExporterKind`](crate::backend::ExporterKind).
pub const OTEL_LOGS_EXPORTER: &str = "OTEL_LOGS_EXPORTER";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Batch settings from the environment, on top of the defaults.
pub fn batch_config_from_env() -> BatchConfig {
    batch_config_from(|key| std::env::var(key).ok())
}

/// Record limits from the environment, on top of the defaults.
pub fn limits_from_env() -> LogRecordLimits {
    limits_from(|key| std::env::var(key).ok())
}

/// Same as [`batch_config_from_env`] with an explicit lookup, so callers
/// (and tests) can read from somewhere other than the process environment.
pub fn batch_config_from(lookup: impl Fn(&str) -> Option<String>) -> BatchConfig {
    let mut config = BatchConfig::default();
    if let Some(n) = parse(&lookup, OTEL_BLRP_MAX_EXPORT_BATCH_SIZE) {
        config = config.with_max_export_batch_size(n);
    }
    if let Some(n) = parse(&lookup, OTEL_BLRP_MAX_QUEUE_SIZE) {
        config = config.with_max_queue_size(n);
    }
    if let Some(ms) = parse(&lookup, OTEL_BLRP_SCHEDULE_DELAY) {
        config = config.with_scheduled_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = parse(&lookup, OTEL_BLRP_EXPORT_TIMEOUT) {
        config = config.with_export_timeout(Duration::from_millis(ms));
    }
    config
}

pub fn limits_from(lookup: impl Fn(&str) -> Option<String>) -> LogRecordLimits {
    let mut limits = LogRecordLimits::default();
    if let Some(n) = parse(&lookup, OTEL_LOGRECORD_ATTRIBUTE_COUNT_LIMIT)
        .or_else(|| parse(&lookup, OTEL_ATTRIBUTE_COUNT_LIMIT))
    {
        limits.attribute_count_limit = n;
    }
    if let Some(n) = parse(&lookup, OTEL_LOGRECORD_ATTRIBUTE_VALUE_LENGTH_LIMIT)
        .or_else(|| parse(&lookup, OTEL_ATTRIBUTE_VALUE_LENGTH_LIMIT))
    {
        limits.attribute_value_length_limit = Some(n);
    }
    limits
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = raw, "ignoring invalid value, using default");
            None
        }
    }
}

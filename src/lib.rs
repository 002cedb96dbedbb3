//! Log record processing pipeline.
//!
//! Records are created by a [`Logger`], handed to one or more
//! [`LogRecordProcessor`]s and, usually through a
//! [`BatchLogRecordProcessor`], delivered in batches to a
//! [`LogRecordExporter`]. [`init_tracing`] wires the whole thing behind a
//! `tracing` subscriber.

pub mod error;
pub mod value;
pub mod severity;
pub mod trace;
pub mod resource;
pub mod record;
pub mod exporter;
pub mod processor;
pub mod batch;
pub mod simple;
pub mod multi;
pub mod noop;
pub mod memory;

#[cfg(feature = "console")]
pub mod console;

pub mod logger;
pub mod layer;
pub mod init;
pub mod env;
pub mod backend;

#[cfg(test)]
mod testing;

pub use batch::{BatchConfig, BatchLogRecordProcessor};
pub use error::{ConfigError, ErrorHandler, LogError, LogResult};
pub use exporter::{ExportFuture, LogRecordExporter};
pub use init::{init_tracing, init_tracing_with_config, PipelineConfig};
pub use logger::{Logger, LoggerConfig, LoggerProvider};
pub use processor::{EnabledOptions, LogRecordProcessor};
pub use record::{LogRecord, LogRecordLimits, LogRecordParams};
pub use resource::{InstrumentationScope, Resource};
pub use severity::Severity;
pub use value::AnyValue;

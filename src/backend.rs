use std::str::FromStr;
use std::sync::Arc;

use crate::env::{env_or, OTEL_LOGS_EXPORTER};
use crate::error::ConfigError;
use crate::exporter::LogRecordExporter;
use crate::noop::NoopLogRecordExporter;

/// Exporters that can be selected by name, e.g. through `OTEL_LOGS_EXPORTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterKind {
    /// JSON lines on stdout.
    Console,
    /// Discard everything.
    None,
}

impl FromStr for ExporterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(ExporterKind::Console),
            "none" => Ok(ExporterKind::None),
            _ => Err(ConfigError::UnknownExporter(s.to_string())),
        }
    }
}

impl ExporterKind {
    /// Read `OTEL_LOGS_EXPORTER`, defaulting to [`ExporterKind::Console`].
    pub fn from_env() -> Result<Self, ConfigError> {
        env_or(OTEL_LOGS_EXPORTER, "console").parse()
    }
}

/// Create a concrete exporter for `kind`.
///
/// This is the main entry point for applications that pick their
/// exporter from configuration instead of constructing one by hand.
pub fn make_exporter(kind: ExporterKind) -> Result<Arc<dyn LogRecordExporter>, ConfigError> {
    match kind {
        ExporterKind::Console => {
            #[cfg(feature = "console")]
            {
                Ok(Arc::new(crate::console::ConsoleLogRecordExporter::new()))
            }

            #[cfg(not(feature = "console"))]
            {
                Err(ConfigError::ExporterDisabled("console"))
            }
        }
        ExporterKind::None => Ok(Arc::new(NoopLogRecordExporter)),
    }
}

use crate::batch::{BatchConfig, BatchLogRecordProcessor};
use crate::env;
use crate::error::ConfigError;
use crate::exporter::LogRecordExporter;
use crate::layer::LogBridgeLayer;
use crate::logger::{LoggerConfig, LoggerProvider};
use crate::record::LogRecordLimits;
use crate::resource::{InstrumentationScope, Resource};
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Pipeline configuration used by [`init_tracing_with_config`].
///
/// **Fields**
/// - `batch`: [`BatchConfig`] of the batch processor in front of the
///   exporter.
/// - `limits`: attribute limits applied to every record.
/// - `logger`: severity threshold and trace-based filtering.
/// - `resource`: entity producing the logs (service name, host, ...).
/// - `scope_name`: instrumentation scope of the bridged events.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to the bridge and events are also printed to the
///   console.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub batch: BatchConfig,
    pub limits: LogRecordLimits,
    pub logger: LoggerConfig,
    pub resource: Arc<Resource>,
    pub scope_name: String,
    pub enable_stdout: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            limits: LogRecordLimits::default(),
            logger: LoggerConfig::default(),
            resource: Arc::new(Resource::empty()),
            scope_name: env!("CARGO_PKG_NAME").to_string(),
            enable_stdout: true,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the `OTEL_BLRP_*` and attribute limit
    /// variables, see [`crate::env`].
    pub fn from_env() -> Self {
        Self {
            batch: env::batch_config_from_env(),
            limits: env::limits_from_env(),
            ..Self::default()
        }
    }
}

/// Errors from [`init_tracing`] / [`init_tracing_with_config`].
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid pipeline configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to install global subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Build the provider and the bridge layer without installing anything
/// globally. Useful to compose the layer into an existing subscriber.
///
/// Must be called from within a Tokio runtime.
pub fn build_pipeline(
    exporter: Arc<dyn LogRecordExporter>,
    config: PipelineConfig,
) -> Result<(LoggerProvider, LogBridgeLayer), ConfigError> {
    let processor = BatchLogRecordProcessor::builder(exporter)
        .with_config(config.batch)
        .build()?;

    let provider = LoggerProvider::builder()
        .with_resource(config.resource)
        .with_limits(config.limits)
        .with_logger_config(config.logger)
        .with_processor(processor)
        .build();

    let layer = LogBridgeLayer::new(provider.logger(InstrumentationScope::new(config.scope_name)));
    Ok((provider, layer))
}

/// Initialize the global `tracing` subscriber with an exporter and
/// [`PipelineConfig`].
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`LogBridgeLayer`] as the global
/// default subscriber, so every `tracing` event in the process becomes a
/// log record.
///
/// **Returns**
/// - The [`LoggerProvider`] behind the layer. Call
///   [`LoggerProvider::shutdown`] before exiting so buffered records are
///   exported.
pub fn init_tracing_with_config(
    exporter: Arc<dyn LogRecordExporter>,
    config: PipelineConfig,
) -> Result<LoggerProvider, InitError> {
    let enable_stdout = config.enable_stdout;
    let (provider, layer) = build_pipeline(exporter, config)?;

    // Two arms because the layered subscriber types differ.
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(provider)
}

/// Initialize tracing with [`PipelineConfig::from_env`].
///
/// This is the recommended entrypoint for typical services.
pub fn init_tracing(exporter: Arc<dyn LogRecordExporter>) -> Result<LoggerProvider, InitError> {
    init_tracing_with_config(exporter, PipelineConfig::from_env())
}

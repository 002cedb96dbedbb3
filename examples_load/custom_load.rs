use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use log_pipeline::batch::{BatchConfig, BatchLogRecordProcessor};
use log_pipeline::layer::LogBridgeLayer;
use log_pipeline::logger::LoggerProvider;
use log_pipeline::noop::NoopLogRecordExporter;
use log_pipeline::resource::InstrumentationScope;

#[tokio::main]
async fn main() {
    let config = BatchConfig::default()
        .with_max_queue_size(50_000)
        .with_max_export_batch_size(1_000)
        .with_scheduled_delay(Duration::from_millis(200));

    let processor = BatchLogRecordProcessor::builder(Arc::new(NoopLogRecordExporter))
        .with_config(config)
        .build()
        .expect("build batch processor");

    let provider = LoggerProvider::builder()
        .with_processor(processor.clone())
        .build();
    let layer = LogBridgeLayer::new(provider.logger(InstrumentationScope::new("custom_load")));
    tracing::subscriber::set_global_default(Registry::default().with(layer))
        .expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: emitted {} events in {:?} (~{:.0} ev/s), {} dropped",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        processor.dropped_records()
    );

    provider.shutdown().await.expect("shutdown");
}

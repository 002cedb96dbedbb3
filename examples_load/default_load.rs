use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_pipeline::init::init_tracing;
use log_pipeline::noop::NoopLogRecordExporter;

#[tokio::main]
async fn main() {
    let exporter = Arc::new(NoopLogRecordExporter);
    let provider = init_tracing(exporter).expect("init tracing");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Export whatever is still queued
    provider.shutdown().await.expect("shutdown");
}

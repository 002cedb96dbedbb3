use std::sync::Arc;

use log_pipeline::exporter::{ExportFuture, LogRecordExporter};
use log_pipeline::init::init_tracing;
use log_pipeline::record::LogRecord;
use log_pipeline::LogResult;
use async_trait::async_trait;
use tracing::{error, info};

/// Example of integrating a completely custom backend by implementing
/// the `LogRecordExporter` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide an exporter.
#[derive(Debug)]
struct MyCustomDbExporter;

#[async_trait]
impl LogRecordExporter for MyCustomDbExporter {
    fn export(&self, batch: Vec<Arc<LogRecord>>) -> ExportFuture {
        Box::pin(async move {
            // Here you would call your own client library for the target DB.
            for record in &batch {
                println!("[my-custom-db] {:?} {:?}", record.severity_text(), record.body());
            }
            Ok(())
        })
    }

    async fn shutdown(&self) -> LogResult<()> {
        println!("[my-custom-db] connection closed");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let provider = init_tracing(Arc::new(MyCustomDbExporter)).expect("init tracing");

    info!("custom exporter example started");
    error!(db = "my-custom-db", "simulated error sent via custom exporter");

    provider.shutdown().await.expect("shutdown");
}

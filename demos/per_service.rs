use std::sync::Arc;
use tracing::{error, info};

use log_pipeline::backend::{make_exporter, ExporterKind};
use log_pipeline::init::{init_tracing_with_config, PipelineConfig};
use log_pipeline::resource::{Attributes, Resource};

#[tokio::main]
async fn main() {
    // OTEL_LOGS_EXPORTER=none silences the output
    let kind = ExporterKind::from_env().expect("exporter kind");
    let exporter = make_exporter(kind).expect("exporter");

    let mut attributes = Attributes::new();
    attributes.insert("service.name".to_string(), "auth".into());
    attributes.insert("deployment.environment".to_string(), "dev".into());

    let config = PipelineConfig {
        resource: Arc::new(Resource::new(attributes)),
        scope_name: "auth::login".to_string(),
        enable_stdout: false,
        ..PipelineConfig::from_env()
    };
    let provider = init_tracing_with_config(exporter, config).expect("init tracing");

    info!("starting service");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    provider.shutdown().await.expect("shutdown");
}

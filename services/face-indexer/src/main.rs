use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use face_indexer::config::{Config, LogFormat};
use face_indexer::{
    handle_event, DynamoFaceStore, NotificationProcessor, ProcessorSettings, S3Event,
    RekognitionFaceRecognizer, S3ObjectSource,
};
use lambda_runtime::{service_fn, LambdaEvent};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, config.service.log_format);

    info!(
        service = %config.service.name,
        region = %config.aws.region,
        collection_id = %config.rekognition.collection_id,
        table = %config.dynamodb.table_name,
        "Starting face indexer"
    );

    // Clients are built once and reused across invocations
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;

    let processor = Arc::new(NotificationProcessor::new(
        Arc::new(S3ObjectSource::new(&sdk_config, &config.aws)),
        Arc::new(RekognitionFaceRecognizer::new(
            &sdk_config,
            &config.aws,
            &config.rekognition,
        )),
        Arc::new(DynamoFaceStore::new(&sdk_config, &config.aws)),
        ProcessorSettings::from(&config),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<S3Event>| {
        let processor = processor.clone();
        async move { handle_event(&processor, event).await }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
    .context("Lambda runtime failed")?;

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().without_time()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

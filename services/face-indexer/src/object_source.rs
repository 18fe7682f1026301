use crate::config::AwsConfig;
use crate::error::StageError;
use async_trait::async_trait;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use aws_types::SdkConfig;
use bytes::Bytes;
use tracing::{debug, info, instrument};

/// Read-only access to stored objects
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetch the full contents of an object
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, StageError>;
}

/// S3-backed object source
pub struct S3ObjectSource {
    client: S3Client,
}

impl S3ObjectSource {
    /// Create a new S3 object source from the shared SDK configuration
    pub fn new(sdk_config: &SdkConfig, config: &AwsConfig) -> Self {
        let mut s3_config_builder = S3ConfigBuilder::from(sdk_config);

        // Configure custom endpoint for LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(region = %config.region, "S3 object source initialized");

        Self { client }
    }
}

#[async_trait]
impl ObjectSource for S3ObjectSource {
    #[instrument(skip(self))]
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, StageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StageError::Fetch(DisplayErrorContext(&e).to_string()))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StageError::Fetch(e.to_string()))?
            .into_bytes();

        debug!(size_bytes = body.len(), "Object fetched from S3");

        Ok(body)
    }
}

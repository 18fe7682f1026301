use crate::config::AwsConfig;
use crate::error::StageError;
use async_trait::async_trait;
use aws_sdk_dynamodb::config::Builder as DynamoDbConfigBuilder;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_types::SdkConfig;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Primary key attribute of the face table
pub const REKOGNITION_ID: &str = "RekognitionId";
/// Attribute holding the object key the face was indexed from
pub const FACE_PRINTS_NAME: &str = "FacePrintsName";

/// One row of the face table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceEntry {
    /// Face id assigned at indexing (primary key)
    pub rekognition_id: String,
    /// Object key of the source image
    pub face_prints_name: String,
}

impl FaceEntry {
    pub fn new(rekognition_id: impl Into<String>, face_prints_name: impl Into<String>) -> Self {
        Self {
            rekognition_id: rekognition_id.into(),
            face_prints_name: face_prints_name.into(),
        }
    }

    /// DynamoDB item for this entry
    pub fn to_item(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                REKOGNITION_ID.to_string(),
                AttributeValue::S(self.rekognition_id.clone()),
            ),
            (
                FACE_PRINTS_NAME.to_string(),
                AttributeValue::S(self.face_prints_name.clone()),
            ),
        ])
    }
}

/// Durable store for recognized faces
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Insert or overwrite the row keyed by `entry.rekognition_id`
    async fn put_face(&self, table: &str, entry: &FaceEntry) -> Result<(), StageError>;
}

/// DynamoDB-backed face store
pub struct DynamoFaceStore {
    client: DynamoDbClient,
}

impl DynamoFaceStore {
    /// Create a new face store from the shared SDK configuration
    pub fn new(sdk_config: &SdkConfig, config: &AwsConfig) -> Self {
        let mut builder = DynamoDbConfigBuilder::from(sdk_config);

        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = DynamoDbClient::from_conf(builder.build());

        info!(region = %config.region, "DynamoDB face store initialized");

        Self { client }
    }
}

#[async_trait]
impl FaceStore for DynamoFaceStore {
    #[instrument(skip(self, entry), fields(rekognition_id = %entry.rekognition_id))]
    async fn put_face(&self, table: &str, entry: &FaceEntry) -> Result<(), StageError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(entry.to_item()))
            .send()
            .await
            .map_err(|e| StageError::Persist(DisplayErrorContext(&e).to_string()))?;

        debug!(
            face_prints_name = %entry.face_prints_name,
            "Face stored"
        );

        Ok(())
    }
}

use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Main configuration for the face indexer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,
    /// Shared AWS client configuration
    pub aws: AwsConfig,
    /// Face recognition configuration
    pub rekognition: RekognitionConfig,
    /// Face table configuration
    pub dynamodb: DynamoDbConfig,
    /// Pipeline policy
    pub pipeline: PipelineConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// AWS client configuration shared by S3, Rekognition and DynamoDB
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,
    /// Custom endpoint URL (for LocalStack and friends)
    pub endpoint_url: Option<String>,
    /// Force path-style S3 access
    pub force_path_style: bool,
}

/// Rekognition collection and request options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RekognitionConfig {
    /// Collection faces are indexed into and searched against.
    /// The collection must already exist.
    pub collection_id: String,
    /// Facial attributes returned by detection and indexing
    pub detection_attributes: DetectionAttributes,
    /// Upper bound on faces indexed per image
    pub index_max_faces: Option<i32>,
    /// Quality filter applied when indexing
    pub quality_filter: Option<QualityFilter>,
    /// Upper bound on matches returned by a search
    pub search_max_faces: Option<i32>,
    /// Minimum similarity (0-100) for a search match
    pub face_match_threshold: Option<f32>,
}

/// Facial attribute set requested from Rekognition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionAttributes {
    #[default]
    Default,
    All,
}

/// Indexing quality filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFilter {
    None,
    Auto,
    Low,
    Medium,
    High,
}

/// DynamoDB table configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoDbConfig {
    /// Table holding one row per indexed face
    pub table_name: String,
}

/// Pipeline policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// When an image without faces is abandoned
    pub face_check: FaceCheck,
}

/// Position of the detected-face count check in the pipeline.
///
/// `BeforeIndexing` abandons a faceless image right after detection, so it is
/// never indexed or searched. `AfterSearch` keeps the older ordering where the
/// image is indexed and searched first and only abandoned before persisting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceCheck {
    #[default]
    BeforeIndexing,
    AfterSearch,
}

// Default value functions
fn default_service_name() -> String {
    "face-indexer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_collection_id() -> String {
    "imageComparision".to_string()
}

fn default_table_name() -> String {
    "facerecognition".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

impl Default for RekognitionConfig {
    fn default() -> Self {
        Self {
            collection_id: default_collection_id(),
            detection_attributes: DetectionAttributes::default(),
            index_max_faces: None,
            quality_filter: None,
            search_max_faces: None,
            face_match_threshold: None,
        }
    }
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
        }
    }
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/face-indexer").required(false))
            .add_source(config::File::with_name("/etc/face-indexer/config").required(false))
            // FACE_INDEXER__DYNAMODB__TABLE_NAME -> dynamodb.table_name
            .add_source(
                config::Environment::with_prefix("FACE_INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    /// Build and validate configuration from an arbitrary set of sources
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.region.is_empty() {
            return Err(ConfigError::MissingRequired("aws.region".to_string()));
        }

        if self.rekognition.collection_id.is_empty() {
            return Err(ConfigError::MissingRequired(
                "rekognition.collection_id".to_string(),
            ));
        }

        if self.dynamodb.table_name.is_empty() {
            return Err(ConfigError::MissingRequired(
                "dynamodb.table_name".to_string(),
            ));
        }

        if let Some(threshold) = self.rekognition.face_match_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue {
                    key: "rekognition.face_match_threshold".to_string(),
                    message: format!("{threshold} is outside 0-100"),
                });
            }
        }

        for (key, value) in [
            ("rekognition.index_max_faces", self.rekognition.index_max_faces),
            ("rekognition.search_max_faces", self.rekognition.search_max_faces),
        ] {
            if matches!(value, Some(n) if n < 1) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<Config, ConfigError> {
        Config::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.dynamodb.table_name, "facerecognition");
        assert_eq!(config.rekognition.collection_id, "imageComparision");
        assert_eq!(config.pipeline.face_check, FaceCheck::BeforeIndexing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_sources_use_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config.service.name, "face-indexer");
        assert_eq!(config.service.log_format, LogFormat::Json);
        assert_eq!(config.rekognition.detection_attributes, DetectionAttributes::Default);
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            [aws]
            region = "eu-west-1"
            endpoint_url = "http://localhost:4566"

            [rekognition]
            collection_id = "staff"
            detection_attributes = "ALL"
            quality_filter = "AUTO"
            face_match_threshold = 90.0

            [pipeline]
            face_check = "after_search"
            "#,
        )
        .unwrap();

        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.rekognition.collection_id, "staff");
        assert_eq!(config.rekognition.detection_attributes, DetectionAttributes::All);
        assert_eq!(config.rekognition.quality_filter, Some(QualityFilter::Auto));
        assert_eq!(config.pipeline.face_check, FaceCheck::AfterSearch);
        // untouched sections keep their defaults
        assert_eq!(config.dynamodb.table_name, "facerecognition");
    }

    #[test]
    fn test_rejects_empty_table_name() {
        let err = from_toml("[dynamodb]\ntable_name = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(key) if key == "dynamodb.table_name"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let err = from_toml("[rekognition]\nface_match_threshold = 120.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_zero_max_faces() {
        let err = from_toml("[rekognition]\nsearch_max_faces = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "rekognition.search_max_faces"));
    }
}

use crate::config::{AwsConfig, DetectionAttributes, QualityFilter, RekognitionConfig};
use crate::error::StageError;
use async_trait::async_trait;
use aws_sdk_rekognition::config::Builder as RekognitionConfigBuilder;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{self as rekognition, Attribute, Image};
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_types::SdkConfig;
use bytes::Bytes;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Bounding box of a face, as ratios of the image dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A face found by detection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedFace {
    /// Detection confidence (0-100)
    pub confidence: Option<f32>,
    pub bounding_box: Option<BoundingBox>,
    pub landmark_count: usize,
}

impl fmt::Display for DetectedFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face(")?;
        if let Some(confidence) = self.confidence {
            write!(f, "confidence={confidence:.2}, ")?;
        }
        if let Some(b) = self.bounding_box {
            write!(
                f,
                "box=[{:.3}, {:.3}, {:.3}, {:.3}], ",
                b.left, b.top, b.width, b.height
            )?;
        }
        write!(f, "landmarks={})", self.landmark_count)
    }
}

/// A face newly added to the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFace {
    /// Identifier assigned by the recognition service
    pub face_id: String,
    pub external_image_id: String,
}

/// A face the service detected but declined to index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnindexedFace {
    pub reasons: Vec<String>,
}

/// Result of indexing one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOutcome {
    pub indexed: Vec<IndexedFace>,
    pub unindexed: Vec<UnindexedFace>,
}

/// A collection face similar to a face in the searched image
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub face_id: String,
    /// Similarity (0-100)
    pub similarity: f32,
}

/// Face detection, indexing and search primitives
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Detect the faces in an image
    async fn detect_faces(&self, image: &Bytes) -> Result<Vec<DetectedFace>, StageError>;

    /// Add the faces in an image to a collection
    async fn index_faces(
        &self,
        collection_id: &str,
        image: &Bytes,
        external_image_id: &str,
    ) -> Result<IndexOutcome, StageError>;

    /// Search a collection for faces matching the largest face in an image
    async fn search_faces_by_image(
        &self,
        collection_id: &str,
        image: &Bytes,
    ) -> Result<Vec<FaceMatch>, StageError>;
}

/// Rekognition-backed face recognizer
pub struct RekognitionFaceRecognizer {
    client: RekognitionClient,
    config: RekognitionConfig,
}

impl RekognitionFaceRecognizer {
    /// Create a new recognizer from the shared SDK configuration
    pub fn new(sdk_config: &SdkConfig, aws: &AwsConfig, config: &RekognitionConfig) -> Self {
        let mut builder = RekognitionConfigBuilder::from(sdk_config);

        if let Some(ref endpoint_url) = aws.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = RekognitionClient::from_conf(builder.build());

        info!(
            collection_id = %config.collection_id,
            region = %aws.region,
            "Rekognition face recognizer initialized"
        );

        Self {
            client,
            config: config.clone(),
        }
    }

    fn attributes(&self) -> Attribute {
        match self.config.detection_attributes {
            DetectionAttributes::Default => Attribute::Default,
            DetectionAttributes::All => Attribute::All,
        }
    }

    fn quality_filter(&self) -> Option<rekognition::QualityFilter> {
        self.config.quality_filter.map(|filter| match filter {
            QualityFilter::None => rekognition::QualityFilter::None,
            QualityFilter::Auto => rekognition::QualityFilter::Auto,
            QualityFilter::Low => rekognition::QualityFilter::Low,
            QualityFilter::Medium => rekognition::QualityFilter::Medium,
            QualityFilter::High => rekognition::QualityFilter::High,
        })
    }
}

fn to_image(bytes: &Bytes) -> Image {
    Image::builder().bytes(Blob::new(bytes.to_vec())).build()
}

fn to_detected_face(detail: &rekognition::FaceDetail) -> DetectedFace {
    DetectedFace {
        confidence: detail.confidence(),
        bounding_box: detail.bounding_box().map(|b| BoundingBox {
            left: b.left().unwrap_or_default(),
            top: b.top().unwrap_or_default(),
            width: b.width().unwrap_or_default(),
            height: b.height().unwrap_or_default(),
        }),
        landmark_count: detail.landmarks().len(),
    }
}

#[async_trait]
impl FaceRecognizer for RekognitionFaceRecognizer {
    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    async fn detect_faces(&self, image: &Bytes) -> Result<Vec<DetectedFace>, StageError> {
        let output = self
            .client
            .detect_faces()
            .image(to_image(image))
            .attributes(self.attributes())
            .send()
            .await
            .map_err(|e| StageError::Detection(DisplayErrorContext(&e).to_string()))?;

        let faces: Vec<DetectedFace> = output.face_details().iter().map(to_detected_face).collect();

        debug!(face_count = faces.len(), "Faces detected");

        Ok(faces)
    }

    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    async fn index_faces(
        &self,
        collection_id: &str,
        image: &Bytes,
        external_image_id: &str,
    ) -> Result<IndexOutcome, StageError> {
        let output = self
            .client
            .index_faces()
            .collection_id(collection_id)
            .image(to_image(image))
            .external_image_id(external_image_id)
            .detection_attributes(self.attributes())
            .set_max_faces(self.config.index_max_faces)
            .set_quality_filter(self.quality_filter())
            .send()
            .await
            .map_err(|e| StageError::Indexing(DisplayErrorContext(&e).to_string()))?;

        let mut indexed = Vec::with_capacity(output.face_records().len());
        for record in output.face_records() {
            match record.face().and_then(|face| face.face_id()) {
                Some(face_id) => indexed.push(IndexedFace {
                    face_id: face_id.to_string(),
                    external_image_id: record
                        .face()
                        .and_then(|face| face.external_image_id())
                        .unwrap_or(external_image_id)
                        .to_string(),
                }),
                None => warn!("Indexed face record without a face id"),
            }
        }

        let unindexed = output
            .unindexed_faces()
            .iter()
            .map(|face| UnindexedFace {
                reasons: face
                    .reasons()
                    .iter()
                    .map(|reason| reason.as_str().to_string())
                    .collect(),
            })
            .collect();

        Ok(IndexOutcome { indexed, unindexed })
    }

    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    async fn search_faces_by_image(
        &self,
        collection_id: &str,
        image: &Bytes,
    ) -> Result<Vec<FaceMatch>, StageError> {
        let output = self
            .client
            .search_faces_by_image()
            .collection_id(collection_id)
            .image(to_image(image))
            .set_max_faces(self.config.search_max_faces)
            .set_face_match_threshold(self.config.face_match_threshold)
            .send()
            .await
            .map_err(|e| StageError::Search(DisplayErrorContext(&e).to_string()))?;

        let matches = output
            .face_matches()
            .iter()
            .filter_map(|m| {
                let face_id = m.face().and_then(|face| face.face_id())?;
                Some(FaceMatch {
                    face_id: face_id.to_string(),
                    similarity: m.similarity().unwrap_or_default(),
                })
            })
            .collect();

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_face_display() {
        let face = DetectedFace {
            confidence: Some(99.91),
            bounding_box: Some(BoundingBox {
                left: 0.1,
                top: 0.2,
                width: 0.3,
                height: 0.4,
            }),
            landmark_count: 5,
        };

        assert_eq!(
            face.to_string(),
            "face(confidence=99.91, box=[0.100, 0.200, 0.300, 0.400], landmarks=5)"
        );
        assert_eq!(DetectedFace::default().to_string(), "face(landmarks=0)");
    }

    #[test]
    fn test_to_detected_face() {
        let detail = rekognition::FaceDetail::builder()
            .confidence(98.5)
            .bounding_box(
                rekognition::BoundingBox::builder()
                    .left(0.25)
                    .top(0.5)
                    .width(0.1)
                    .build(),
            )
            .build();

        let face = to_detected_face(&detail);
        assert_eq!(face.confidence, Some(98.5));
        assert_eq!(
            face.bounding_box,
            Some(BoundingBox {
                left: 0.25,
                top: 0.5,
                width: 0.1,
                height: 0.0,
            })
        );
        assert_eq!(face.landmark_count, 0);
    }
}

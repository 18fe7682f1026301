//! Per-notification face pipeline.
//!
//! Each notification runs fetch, detect, index, search and persist in order.
//! A failing stage abandons that notification only; the batch carries on
//! with the next one and the invocation as a whole still succeeds.

use crate::config::{Config, FaceCheck};
use crate::error::{Stage, StageError};
use crate::event::{external_image_id, ChangeNotification};
use crate::face_recognizer::{DetectedFace, FaceMatch, FaceRecognizer, IndexedFace};
use crate::face_store::{FaceEntry, FaceStore};
use crate::object_source::ObjectSource;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Status returned for an empty batch
pub const NO_RECORDS_STATUS: &str = "no record found";
/// Status returned once every notification of a batch has been attempted
pub const SUCCESS_STATUS: &str = "successfully read file from s3 bucket";

/// Read-only settings shared by every notification
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub collection_id: String,
    pub table_name: String,
    pub face_check: FaceCheck,
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            collection_id: config.rekognition.collection_id.clone(),
            table_name: config.dynamodb.table_name.clone(),
            face_check: config.pipeline.face_check,
        }
    }
}

/// Why a notification was abandoned
#[derive(Debug, Clone, PartialEq)]
pub enum AbandonReason {
    /// A collaborator call failed
    Failed(StageError),
    /// Detection found no faces in the image
    NoFaces,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::Failed(e) => write!(f, "{e}"),
            AbandonReason::NoFaces => f.write_str("No faces detected in the image"),
        }
    }
}

/// Counts for a notification that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub faces_detected: usize,
    pub faces_indexed: usize,
    pub faces_unindexed: usize,
    pub matches: usize,
    pub stored: usize,
    pub store_failures: usize,
}

/// Terminal state of one notification
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Completion),
    Abandoned { stage: Stage, reason: AbandonReason },
}

impl Outcome {
    fn failed(error: StageError) -> Self {
        Outcome::Abandoned {
            stage: error.stage(),
            reason: AbandonReason::Failed(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

/// Outcome of one notification in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationReport {
    pub notification: ChangeNotification,
    pub outcome: Outcome,
}

/// Result of processing a batch.
///
/// Success is reported for the invocation even when individual notifications
/// were abandoned; per-notification detail lives in the reports and the logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    reports: Vec<NotificationReport>,
}

impl BatchSummary {
    /// True when the batch had no notifications
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn reports(&self) -> &[NotificationReport] {
        &self.reports
    }

    pub fn completed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_completed()).count()
    }

    pub fn abandoned(&self) -> usize {
        self.reports.len() - self.completed()
    }

    /// Status string handed back to the invoker
    pub fn status(&self) -> &'static str {
        if self.is_empty() {
            NO_RECORDS_STATUS
        } else {
            SUCCESS_STATUS
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

/// Pipeline position of one notification
enum PipelineState {
    Received,
    Fetched {
        image: Bytes,
    },
    Detected {
        image: Bytes,
        faces: Vec<DetectedFace>,
    },
    Indexed {
        image: Bytes,
        faces: Vec<DetectedFace>,
        indexed: Vec<IndexedFace>,
        unindexed: usize,
    },
    Searched {
        faces: Vec<DetectedFace>,
        indexed: Vec<IndexedFace>,
        unindexed: usize,
        matches: Vec<FaceMatch>,
    },
    Done(Outcome),
}

/// Runs the face pipeline over batches of change notifications
pub struct NotificationProcessor {
    objects: Arc<dyn ObjectSource>,
    recognizer: Arc<dyn FaceRecognizer>,
    store: Arc<dyn FaceStore>,
    settings: ProcessorSettings,
}

impl NotificationProcessor {
    pub fn new(
        objects: Arc<dyn ObjectSource>,
        recognizer: Arc<dyn FaceRecognizer>,
        store: Arc<dyn FaceStore>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            objects,
            recognizer,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Process a batch in delivery order, one notification at a time
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn process(&self, batch: &[ChangeNotification]) -> BatchSummary {
        if batch.is_empty() {
            info!("No records found");
            return BatchSummary::default();
        }

        let mut reports = Vec::with_capacity(batch.len());

        for notification in batch {
            let outcome = self.process_notification(notification).await;

            match &outcome {
                Outcome::Completed(_) => {
                    metrics::counter!("face_indexer.notifications.completed").increment(1);
                }
                Outcome::Abandoned { stage, .. } => {
                    metrics::counter!("face_indexer.notifications.abandoned", "stage" => stage.as_str())
                        .increment(1);
                }
            }

            reports.push(NotificationReport {
                notification: notification.clone(),
                outcome,
            });
        }

        let summary = BatchSummary { reports };

        info!(
            completed = summary.completed(),
            abandoned = summary.abandoned(),
            table = %self.settings.table_name,
            "Batch processed"
        );

        summary
    }

    /// Drive one notification through the pipeline until it completes or is abandoned
    #[instrument(
        skip(self, notification),
        fields(bucket = %notification.bucket, object_key = %notification.object_key)
    )]
    pub async fn process_notification(&self, notification: &ChangeNotification) -> Outcome {
        let mut state = PipelineState::Received;

        loop {
            state = match state {
                PipelineState::Received => self.fetch(notification).await,
                PipelineState::Fetched { image } => self.detect(image).await,
                PipelineState::Detected { image, faces } => {
                    self.index(notification, image, faces).await
                }
                PipelineState::Indexed {
                    image,
                    faces,
                    indexed,
                    unindexed,
                } => self.search(image, faces, indexed, unindexed).await,
                PipelineState::Searched {
                    faces,
                    indexed,
                    unindexed,
                    matches,
                } => self.persist(notification, faces, indexed, unindexed, matches).await,
                PipelineState::Done(outcome) => return outcome,
            };
        }
    }

    async fn fetch(&self, notification: &ChangeNotification) -> PipelineState {
        match self
            .objects
            .fetch(&notification.bucket, &notification.object_key)
            .await
        {
            Ok(image) => {
                debug!(size_bytes = image.len(), "Image fetched");
                PipelineState::Fetched { image }
            }
            Err(e) => abandon(e),
        }
    }

    async fn detect(&self, image: Bytes) -> PipelineState {
        let faces = match self.recognizer.detect_faces(&image).await {
            Ok(faces) => faces,
            Err(e) => return abandon(e),
        };

        for face in &faces {
            debug!(face = %face, "Face detected");
        }
        info!(face_count = faces.len(), "Detection finished");

        if faces.is_empty() && self.settings.face_check == FaceCheck::BeforeIndexing {
            return no_faces();
        }

        PipelineState::Detected { image, faces }
    }

    async fn index(
        &self,
        notification: &ChangeNotification,
        image: Bytes,
        faces: Vec<DetectedFace>,
    ) -> PipelineState {
        let external_image_id = external_image_id(&notification.object_key);
        if external_image_id != notification.object_key {
            debug!(external_image_id = %external_image_id, "Object key rewritten for indexing");
        }

        let outcome = match self
            .recognizer
            .index_faces(&self.settings.collection_id, &image, &external_image_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return abandon(e),
        };

        for face in &outcome.unindexed {
            warn!(reasons = ?face.reasons, "Face not indexed");
        }
        info!(
            collection_id = %self.settings.collection_id,
            indexed = outcome.indexed.len(),
            unindexed = outcome.unindexed.len(),
            "Faces indexed"
        );
        metrics::counter!("face_indexer.faces.indexed").increment(outcome.indexed.len() as u64);

        PipelineState::Indexed {
            image,
            faces,
            indexed: outcome.indexed,
            unindexed: outcome.unindexed.len(),
        }
    }

    async fn search(
        &self,
        image: Bytes,
        faces: Vec<DetectedFace>,
        indexed: Vec<IndexedFace>,
        unindexed: usize,
    ) -> PipelineState {
        let matches = match self
            .recognizer
            .search_faces_by_image(&self.settings.collection_id, &image)
            .await
        {
            Ok(matches) => matches,
            Err(e) => return abandon(e),
        };

        if matches.is_empty() {
            info!("No matching faces found in the collection");
        }
        for m in &matches {
            info!(
                matched_face_id = %m.face_id,
                similarity = m.similarity,
                "Face matched with similarity"
            );
        }

        PipelineState::Searched {
            faces,
            indexed,
            unindexed,
            matches,
        }
    }

    async fn persist(
        &self,
        notification: &ChangeNotification,
        faces: Vec<DetectedFace>,
        indexed: Vec<IndexedFace>,
        unindexed: usize,
        matches: Vec<FaceMatch>,
    ) -> PipelineState {
        // Only reachable with no faces under FaceCheck::AfterSearch
        if faces.is_empty() {
            return no_faces();
        }

        let mut completion = Completion {
            faces_detected: faces.len(),
            faces_indexed: indexed.len(),
            faces_unindexed: unindexed,
            matches: matches.len(),
            ..Default::default()
        };

        for face in &indexed {
            let entry = FaceEntry::new(&face.face_id, &notification.object_key);

            // A failed put skips this face only
            match self.store.put_face(&self.settings.table_name, &entry).await {
                Ok(()) => {
                    completion.stored += 1;
                    metrics::counter!("face_indexer.faces.stored").increment(1);
                    info!(
                        rekognition_id = %entry.rekognition_id,
                        face_prints_name = %entry.face_prints_name,
                        table = %self.settings.table_name,
                        "Stored in DynamoDB"
                    );
                }
                Err(e) => {
                    completion.store_failures += 1;
                    metrics::counter!("face_indexer.faces.store_failures").increment(1);
                    error!(
                        stage = %e.stage(),
                        rekognition_id = %entry.rekognition_id,
                        error = %e,
                        "Failed to store face"
                    );
                }
            }
        }

        PipelineState::Done(Outcome::Completed(completion))
    }
}

fn abandon(error: StageError) -> PipelineState {
    error!(stage = %error.stage(), error = %error, "Abandoning notification");
    PipelineState::Done(Outcome::failed(error))
}

fn no_faces() -> PipelineState {
    info!("No faces detected in the image");
    PipelineState::Done(Outcome::Abandoned {
        stage: Stage::Detect,
        reason: AbandonReason::NoFaces,
    })
}

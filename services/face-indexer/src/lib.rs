//! Face Indexer
//!
//! S3-triggered face indexing service. Every object stored in a watched
//! bucket is fetched, run through Rekognition face detection, indexed into a
//! face collection, searched against that collection, and each newly indexed
//! face is recorded in DynamoDB.
//!
//! ## Architecture
//!
//! ```text
//! S3 Event             Rekognition                  DynamoDB
//! ┌──────────────┐     ┌──────────────────────┐     ┌──────────────┐
//! │ Records      │     │ DetectFaces          │     │ face table   │
//! └──────────────┘     │ IndexFaces           │     │ RekognitionId│
//!        │             │ SearchFacesByImage   │     └──────────────┘
//!        ▼             └──────────────────────┘            ▲
//! ┌──────────────┐                ▲                        │
//! │ Notification │────────────────┘                        │
//! │ Processor    │─────────────────────────────────────────┘
//! └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ S3 GetObject │
//! └──────────────┘
//! ```
//!
//! A failure in any stage abandons only the notification being processed.
//! The collaborators sit behind the [`ObjectSource`], [`FaceRecognizer`] and
//! [`FaceStore`] traits and are injected into the [`NotificationProcessor`].

pub mod config;
pub mod error;
pub mod event;
pub mod face_recognizer;
pub mod face_store;
pub mod handler;
pub mod object_source;
pub mod processor;

pub use config::{Config, FaceCheck};
pub use error::{Stage, StageError};
pub use event::{ChangeNotification, S3Event};
pub use face_recognizer::{
    DetectedFace, FaceMatch, FaceRecognizer, IndexOutcome, IndexedFace, RekognitionFaceRecognizer,
};
pub use face_store::{DynamoFaceStore, FaceEntry, FaceStore};
pub use handler::handle_event;
pub use object_source::{ObjectSource, S3ObjectSource};
pub use processor::{
    AbandonReason, BatchSummary, Completion, NotificationProcessor, NotificationReport, Outcome,
    ProcessorSettings,
};

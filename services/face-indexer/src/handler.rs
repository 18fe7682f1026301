use crate::event::S3Event;
use crate::processor::NotificationProcessor;
use lambda_runtime::{Error, LambdaEvent};
use tracing::{info, instrument};

/// Lambda entry point: process every record of an S3 event notification.
///
/// Per-notification failures never fail the invocation; they are only logged.
#[instrument(skip(processor, event), fields(request_id = %event.context.request_id))]
pub async fn handle_event(
    processor: &NotificationProcessor,
    event: LambdaEvent<S3Event>,
) -> Result<String, Error> {
    let batch = event.payload.notifications();

    info!(records = batch.len(), "Received S3 event");

    let summary = processor.process(&batch).await;

    Ok(summary.to_string())
}

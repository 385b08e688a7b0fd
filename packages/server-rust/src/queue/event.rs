//! Unwrapping of SQS trigger events into queue records, and the partial
//! batch response built from a batch result.

use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tunnel_core::QueueRecord;

use crate::service::BatchResult;

/// How a queue message's string body maps to envelope bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Standard base64 with padding. The usual transport wrapping.
    Base64,
    /// The body's UTF-8 bytes are the envelope.
    Raw,
}

/// Unwrap one message into a [`QueueRecord`].
///
/// A body that is not valid base64 under [`BodyEncoding::Base64`] yields an
/// empty record body, which then fails envelope decoding for this message
/// only. A missing body is treated as empty.
#[must_use]
pub fn into_record(message: SqsMessage, encoding: BodyEncoding) -> QueueRecord {
    let message_id = message.message_id.unwrap_or_default();
    let text = message.body.unwrap_or_default();
    let body = match encoding {
        BodyEncoding::Raw => text.into_bytes(),
        BodyEncoding::Base64 => match STANDARD.decode(text.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    message_id = %message_id,
                    error = %e,
                    "message body is not valid base64"
                );
                Vec::new()
            }
        },
    };
    QueueRecord::new(message_id, body)
}

/// Unwrap every message of `event`, keeping delivery order.
#[must_use]
pub fn into_records(event: SqsEvent, encoding: BodyEncoding) -> Vec<QueueRecord> {
    event
        .records
        .into_iter()
        .map(|m| into_record(m, encoding))
        .collect()
}

/// Partial batch response listing the messages to redeliver.
#[must_use]
pub fn batch_response(result: &BatchResult) -> SqsBatchResponse {
    let mut response = SqsBatchResponse::default();
    response.batch_item_failures = result
        .failed_message_ids
        .iter()
        .map(|id| {
            let mut failure = BatchItemFailure::default();
            failure.item_identifier.clone_from(id);
            failure
        })
        .collect();
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Batch engine: drives the message processor over one queue delivery.

use tracing::{info_span, Instrument};
use tunnel_core::{OutgoingMessage, QueueRecord};

use super::processor::{MessageError, MessageProcessor, Outcome};

// ---------------------------------------------------------------------------
// Modes and results
// ---------------------------------------------------------------------------

/// Failure and reply policy for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchModes {
    /// Report per-message failures. When off, any failure fails the whole
    /// delivery.
    pub batch: bool,
    /// Abort the delivery at the first failed message.
    pub suspend: bool,
    /// Emit reply messages for successful records that asked for one.
    pub reply: bool,
}

impl Default for BatchModes {
    fn default() -> Self {
        Self {
            batch: true,
            suspend: false,
            reply: true,
        }
    }
}

/// What one delivery produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Messages to redeliver. Membership is what matters; no duplicates.
    pub failed_message_ids: Vec<String>,
    /// Replies in processing order.
    pub outgoing_messages: Vec<OutgoingMessage>,
}

impl BatchResult {
    fn mark_failed(&mut self, message_id: &str) {
        if !self.failed_message_ids.iter().any(|id| id == message_id) {
            self.failed_message_ids.push(message_id.to_string());
        }
    }

    /// Whether every message succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_message_ids.is_empty()
    }
}

/// The whole delivery must be treated as failed and redelivered.
#[derive(Debug, thiserror::Error)]
pub enum FatalBatchError {
    #[error("message {message_id} failed with suspend mode on: {reason}")]
    Suspended {
        message_id: String,
        #[source]
        reason: MessageError,
    },
    #[error("{} of {total} messages failed with batch mode off", failed_message_ids.len())]
    BatchFailed {
        total: usize,
        failed_message_ids: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// BatchEngine
// ---------------------------------------------------------------------------

/// Processes a delivery's records strictly in order.
#[derive(Clone)]
pub struct BatchEngine {
    processor: MessageProcessor,
}

impl BatchEngine {
    #[must_use]
    pub fn new(processor: MessageProcessor) -> Self {
        Self { processor }
    }

    /// Process `records` in delivery order and apply `modes`.
    ///
    /// Per-message failures are logged and recorded; replies are kept only
    /// when `modes.reply` is on.
    ///
    /// # Errors
    ///
    /// - `FatalBatchError::Suspended` at the first failure when `modes.suspend` is on;
    ///   the remaining records are not processed
    /// - `FatalBatchError::BatchFailed` after all records when `modes.batch` is off
    ///   and any record failed
    pub async fn handle_batch(
        &self,
        records: &[QueueRecord],
        modes: BatchModes,
    ) -> Result<BatchResult, FatalBatchError> {
        let span = info_span!(
            "batch",
            records = records.len(),
            batch_mode = modes.batch,
            suspend_mode = modes.suspend,
            reply_mode = modes.reply,
        );
        self.run(records, modes).instrument(span).await
    }

    async fn run(
        &self,
        records: &[QueueRecord],
        modes: BatchModes,
    ) -> Result<BatchResult, FatalBatchError> {
        let mut result = BatchResult::default();

        for record in records {
            match self.processor.process(record).await {
                Outcome::Success { reply } => {
                    metrics::counter!("tunnel_messages_total", "outcome" => "success").increment(1);
                    if let Some(reply) = reply.filter(|_| modes.reply) {
                        result.outgoing_messages.push(reply);
                    }
                }
                Outcome::Failed { reason } => {
                    metrics::counter!("tunnel_messages_total", "outcome" => reason.kind())
                        .increment(1);
                    tracing::warn!(
                        message_id = %record.message_id,
                        kind = reason.kind(),
                        error = %reason,
                        "message failed"
                    );
                    if modes.suspend {
                        return Err(FatalBatchError::Suspended {
                            message_id: record.message_id.clone(),
                            reason,
                        });
                    }
                    result.mark_failed(&record.message_id);
                }
            }
        }

        tracing::info!(
            failed = result.failed_message_ids.len(),
            replies = result.outgoing_messages.len(),
            "batch complete"
        );

        if !modes.batch && !result.is_clean() {
            return Err(FatalBatchError::BatchFailed {
                total: records.len(),
                failed_message_ids: result.failed_message_ids,
            });
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

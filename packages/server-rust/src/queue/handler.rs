//! Queue entry point: one trigger event in, one batch response out.

use std::sync::Arc;

use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};
use tunnel_core::QueueClient;

use super::event::{batch_response, into_records, BodyEncoding};
use super::reply::{send_replies, ReplySendError};
use crate::service::{
    BatchEngine, BatchModes, Dispatcher, FatalBatchError, GatewayConfig, MessageProcessor,
};

/// The delivery as a whole failed and must be retried.
#[derive(Debug, thiserror::Error)]
pub enum QueueHandlerError {
    #[error(transparent)]
    Batch(#[from] FatalBatchError),
    #[error(transparent)]
    Reply(#[from] ReplySendError),
}

/// Runs SQS deliveries through the batch engine and sends their replies.
#[derive(Clone)]
pub struct QueueHandler {
    engine: BatchEngine,
    client: Arc<dyn QueueClient>,
    modes: BatchModes,
    body_encoding: BodyEncoding,
}

impl QueueHandler {
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        client: Arc<dyn QueueClient>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            engine: BatchEngine::new(MessageProcessor::new(dispatcher)),
            client,
            modes: config.modes,
            body_encoding: config.body_encoding,
        }
    }

    /// Process one delivery: unwrap records, run the batch, send replies,
    /// and report per-message failures.
    ///
    /// # Errors
    ///
    /// - `QueueHandlerError::Batch` when suspend mode aborted the batch or batch
    ///   mode is off and a message failed
    /// - `QueueHandlerError::Reply` when a reply could not be sent
    pub async fn handle_event(
        &self,
        event: SqsEvent,
    ) -> Result<SqsBatchResponse, QueueHandlerError> {
        let records = into_records(event, self.body_encoding);
        let result = self.engine.handle_batch(&records, self.modes).await?;

        if let Err(e) = send_replies(self.client.as_ref(), &result.outgoing_messages).await {
            tracing::error!(error = %e, "reply delivery failed, failing the delivery");
            return Err(e.into());
        }

        Ok(batch_response(&result))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use tunnel_core::{decode_result, encode_call};

    use aws_lambda_events::event::sqs::SqsMessage;

    use super::*;
    use crate::queue::MemoryQueueClient;
    use crate::service::test_support::{call, dispatcher, with_reply, ScriptedInvoker};

    fn message(message_id: &str, body: String) -> SqsMessage {
        let mut message = SqsMessage::default();
        message.message_id = Some(message_id.to_string());
        message.body = Some(body);
        message
    }

    fn wrapped(message_id: &str, envelope: &tunnel_core::CallEnvelope) -> SqsMessage {
        message(message_id, STANDARD.encode(encode_call(envelope).unwrap()))
    }

    fn event_of(records: Vec<SqsMessage>) -> SqsEvent {
        let mut event = SqsEvent::default();
        event.records = records;
        event
    }

    fn handler(client: &Arc<MemoryQueueClient>, config: &GatewayConfig) -> QueueHandler {
        let invoker = Arc::new(ScriptedInvoker::default());
        QueueHandler::new(dispatcher(&invoker), client.clone(), config)
    }

    fn event() -> SqsEvent {
        event_of(vec![
            wrapped("ok", &with_reply(call("/api/svc/run", "in"), "tok")),
            message("bad", "%%%".to_string()),
            wrapped("unrouted", &call("/svc/run", "")),
        ])
    }

    #[tokio::test]
    async fn failures_are_reported_and_replies_sent() {
        let client = Arc::new(MemoryQueueClient::new());
        let response = handler(&client, &GatewayConfig::default())
            .handle_event(event())
            .await
            .unwrap();

        let failed: Vec<&str> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();
        assert_eq!(failed, vec!["bad", "unrouted"]);

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination_queue_id, "reply-queue");
        let reply = decode_result(&sent[0].body).unwrap();
        assert_eq!(reply.client_token, "tok");
        assert_eq!(reply.payload, b"/svc/run:in");
    }

    #[tokio::test]
    async fn reply_send_failure_fails_the_delivery() {
        let client = Arc::new(MemoryQueueClient::new());
        client.fail_on("reply-queue");

        let err = handler(&client, &GatewayConfig::default())
            .handle_event(event())
            .await
            .unwrap_err();

        assert!(matches!(err, QueueHandlerError::Reply(ref e) if e.destination == "reply-queue"));
    }

    #[tokio::test]
    async fn suspend_mode_sends_nothing() {
        let client = Arc::new(MemoryQueueClient::new());
        let mut config = GatewayConfig::default();
        config.modes.suspend = true;

        let err = handler(&client, &config)
            .handle_event(event())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueueHandlerError::Batch(FatalBatchError::Suspended { ref message_id, .. })
                if message_id == "bad"
        ));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn raw_encoding_reads_body_bytes_directly() {
        let client = Arc::new(MemoryQueueClient::new());
        let config = GatewayConfig {
            body_encoding: BodyEncoding::Raw,
            ..GatewayConfig::default()
        };
        // A raw body is a UTF-8 string, so a binary envelope cannot survive it.
        let event = event_of(vec![message("raw", "plain text".to_string())]);

        let response = handler(&client, &config).handle_event(event).await.unwrap();

        assert_eq!(response.batch_item_failures.len(), 1);
    }

    #[tokio::test]
    async fn empty_event_is_clean() {
        let client = Arc::new(MemoryQueueClient::new());
        let response = handler(&client, &GatewayConfig::default())
            .handle_event(SqsEvent::default())
            .await
            .unwrap();
        assert!(response.batch_item_failures.is_empty());
    }
}

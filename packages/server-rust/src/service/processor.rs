//! Per-message processing: decode, dispatch, reply, classify.

use tunnel_core::{
    decode_call, encode_result, EnvelopeError, OutgoingMessage, ProcessingContext, QueueRecord,
    ResultEnvelope,
};

use super::dispatch::{DispatchError, Dispatched, Dispatcher};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a single message failed. Always local to that message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("undecodable message body: {0}")]
    Decode(#[source] EnvelopeError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A reply queue was named without a client token to address it.
    #[error("reply requested on {reply_queue_id} without a client token")]
    ReplyContract { reply_queue_id: String },
    #[error("failed to encode reply: {0}")]
    Encode(#[source] EnvelopeError),
}

impl MessageError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Dispatch(DispatchError::NoRoute(_)) => "no_route",
            Self::Dispatch(DispatchError::Handler { .. }) => "handler",
            Self::Dispatch(DispatchError::Sandbox(_)) => "sandbox",
            Self::ReplyContract { .. } => "missing_client_token",
            Self::Encode(_) => "encode",
        }
    }
}

/// Classified result of processing one record.
#[derive(Debug)]
pub enum Outcome {
    Success { reply: Option<OutgoingMessage> },
    Failed { reason: MessageError },
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// MessageProcessor
// ---------------------------------------------------------------------------

/// Turns one queue record into an [`Outcome`].
#[derive(Clone)]
pub struct MessageProcessor {
    dispatcher: Dispatcher,
}

impl MessageProcessor {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Process one record:
    ///
    /// 1. Decode the body into a `CallEnvelope`
    /// 2. Dispatch its path and payload
    /// 3. Health checks succeed without a reply
    /// 4. No reply queue: succeed without a reply
    /// 5. Reply queue without client token: fail, even though the handler ran
    /// 6. Otherwise succeed with an encoded `ResultEnvelope` for the reply queue
    pub async fn process(&self, record: &QueueRecord) -> Outcome {
        match self.try_process(record).await {
            Ok(reply) => Outcome::Success { reply },
            Err(reason) => Outcome::Failed { reason },
        }
    }

    async fn try_process(
        &self,
        record: &QueueRecord,
    ) -> Result<Option<OutgoingMessage>, MessageError> {
        let envelope = decode_call(&record.body).map_err(MessageError::Decode)?;
        let mut ctx = ProcessingContext::new(envelope.path, &envelope.payload);

        if self.dispatcher.dispatch(&mut ctx).await? == Dispatched::HealthCheck {
            return Ok(None);
        }

        if envelope.reply_queue_id.is_empty() {
            return Ok(None);
        }
        if envelope.client_token.is_empty() {
            return Err(MessageError::ReplyContract {
                reply_queue_id: envelope.reply_queue_id,
            });
        }

        let reply = ResultEnvelope {
            client_token: envelope.client_token,
            reply_queue_id: envelope.reply_queue_id.clone(),
            correlation_id: envelope.correlation_id,
            payload: ctx.result.unwrap_or_default().into_bytes(),
            error_text: None,
        };
        let body = encode_result(&reply).map_err(MessageError::Encode)?;

        Ok(Some(OutgoingMessage {
            destination_queue_id: envelope.reply_queue_id,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tunnel_core::{decode_result, QueueRecord};

    use super::*;
    use crate::service::test_support::{call, dispatcher, record, with_reply, ScriptedInvoker};

    fn processor(invoker: &Arc<ScriptedInvoker>) -> MessageProcessor {
        MessageProcessor::new(dispatcher(invoker))
    }

    #[tokio::test]
    async fn undecodable_body_fails_with_decode() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let outcome = processor(&invoker)
            .process(&QueueRecord::new("m1", b"garbage".to_vec()))
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failed {
                reason: MessageError::Decode(_)
            }
        ));
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn reply_carries_token_correlation_and_result() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/api/pkg/1/run", "data"), "token-1");

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        let reply = match outcome {
            Outcome::Success { reply: Some(reply) } => reply,
            other => panic!("expected a reply, got {other:?}"),
        };
        assert_eq!(reply.destination_queue_id, "reply-queue");
        let result = decode_result(&reply.body).unwrap();
        assert_eq!(result.client_token, "token-1");
        assert_eq!(result.reply_queue_id, "reply-queue");
        assert_eq!(result.correlation_id, envelope.correlation_id);
        assert_eq!(result.payload, b"/pkg/1/run:data");
        assert!(result.error_text.is_none());
    }

    #[tokio::test]
    async fn no_reply_queue_means_no_reply_even_without_token() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = call("/api/pkg/1/run", "data");
        assert!(envelope.client_token.is_empty());

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        assert!(matches!(outcome, Outcome::Success { reply: None }));
        assert_eq!(invoker.calls().len(), 1);
    }

    #[tokio::test]
    async fn reply_without_token_fails_after_handler_ran() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/api/pkg/1/run", "data"), "");

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        assert!(matches!(
            outcome,
            Outcome::Failed {
                reason: MessageError::ReplyContract { ref reply_queue_id }
            } if reply_queue_id == "reply-queue"
        ));
        assert_eq!(invoker.calls().len(), 1);
    }

    #[tokio::test]
    async fn health_check_never_replies() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/health-check", ""), "token-1");

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        assert!(matches!(outcome, Outcome::Success { reply: None }));
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn health_check_ignores_missing_token() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/", ""), "");
        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn unprefixed_path_fails_with_no_route() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/pkg/1/run", ""), "token-1");

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        match outcome {
            Outcome::Failed { reason } => assert_eq!(reason.kind(), "no_route"),
            Outcome::Success { .. } => panic!("unprefixed path must not succeed"),
        }
    }

    #[tokio::test]
    async fn handler_error_fails_without_reply() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let envelope = with_reply(call("/api/fail/x", ""), "token-1");

        let outcome = processor(&invoker).process(&record("m1", &envelope)).await;

        match outcome {
            Outcome::Failed { reason } => assert_eq!(reason.kind(), "handler"),
            Outcome::Success { .. } => panic!("handler error must fail the message"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial_test::serial(stdio)]
    async fn panicking_debug_handler_fails_only_its_message() {
        use crate::service::test_support::stdout_identity;

        let invoker = Arc::new(ScriptedInvoker::default());
        let processor = processor(&invoker);
        let before = stdout_identity();

        let outcome = processor
            .process(&record("m1", &call("/_/api/panic/now", "")))
            .await;
        match outcome {
            Outcome::Failed { reason } => assert_eq!(reason.kind(), "sandbox"),
            Outcome::Success { .. } => panic!("a panicking handler must fail the message"),
        }
        assert_eq!(stdout_identity(), before);

        let next = processor.process(&record("m2", &call("/api/ok/1", "x"))).await;
        assert!(next.is_success());
        assert_eq!(invoker.calls().len(), 2);
    }
}

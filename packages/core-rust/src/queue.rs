use async_trait::async_trait;

/// One delivered queue message, already unwrapped from the transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub message_id: String,
    pub body: Vec<u8>,
}

impl QueueRecord {
    #[must_use]
    pub fn new(message_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            body,
        }
    }
}

/// A reply destined for a caller's reply queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub destination_queue_id: String,
    /// Encoded `ResultEnvelope`.
    pub body: Vec<u8>,
}

/// Queue transport used to deliver replies.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Send one message body to `queue_id`.
    async fn send(&self, queue_id: &str, body: &[u8]) -> anyhow::Result<()>;
}

//! In-memory [`QueueClient`] that records every send.

use async_trait::async_trait;
use parking_lot::Mutex;
use tunnel_core::{OutgoingMessage, QueueClient};

/// Records sends in order. Queue ids listed with
/// [`fail_on`](Self::fail_on) reject sends with an error.
#[derive(Debug, Default)]
pub struct MemoryQueueClient {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing: Mutex<Vec<String>>,
}

impl MemoryQueueClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send to `queue_id` fail.
    pub fn fail_on(&self, queue_id: impl Into<String>) {
        self.failing.lock().push(queue_id.into());
    }

    /// Everything sent so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl QueueClient for MemoryQueueClient {
    async fn send(&self, queue_id: &str, body: &[u8]) -> anyhow::Result<()> {
        if self.failing.lock().iter().any(|q| q == queue_id) {
            anyhow::bail!("queue {queue_id} rejected the message");
        }
        self.sent.lock().push(OutgoingMessage {
            destination_queue_id: queue_id.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_in_order() {
        let client = MemoryQueueClient::new();
        client.send("q1", b"one").await.unwrap();
        client.send("q2", b"two").await.unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].destination_queue_id, "q1");
        assert_eq!(sent[1].body, b"two");
    }

    #[tokio::test]
    async fn failing_queue_rejects_and_records_nothing() {
        let client = MemoryQueueClient::new();
        client.fail_on("dead");
        let err = client.send("dead", b"x").await.unwrap_err();
        assert!(err.to_string().contains("dead"));
        assert!(client.sent().is_empty());
    }
}

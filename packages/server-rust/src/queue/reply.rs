//! Delivery of batch replies through a [`QueueClient`].

use tunnel_core::{OutgoingMessage, QueueClient};

/// A reply could not be delivered. The whole delivery should be retried.
#[derive(Debug, thiserror::Error)]
#[error("failed to send reply {index} to {destination}: {source}")]
pub struct ReplySendError {
    /// Position of the failed reply within the batch's outgoing messages.
    pub index: usize,
    pub destination: String,
    #[source]
    pub source: anyhow::Error,
}

/// Send `messages` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns `ReplySendError` for the first message the client rejects; later
/// messages are not attempted.
pub async fn send_replies(
    client: &dyn QueueClient,
    messages: &[OutgoingMessage],
) -> Result<(), ReplySendError> {
    for (index, message) in messages.iter().enumerate() {
        client
            .send(&message.destination_queue_id, &message.body)
            .await
            .map_err(|source| ReplySendError {
                index,
                destination: message.destination_queue_id.clone(),
                source,
            })?;
        tracing::debug!(destination = %message.destination_queue_id, "reply sent");
    }
    Ok(())
}

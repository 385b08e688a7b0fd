//! Call and result envelopes exchanged over the queue.
//!
//! Both envelopes use the compact (positional) `MsgPack` form produced by
//! `rmp_serde::to_vec()`: each envelope is a five-element array and element
//! *n* carries field number *n*. Field order is therefore part of the wire
//! contract and must never change. Payloads are encoded as `MsgPack` `bin`
//! via `serde_bytes`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A path-addressed call delivered as one queue message body.
///
/// Note: `Default` produces an empty path -- for test convenience only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Field 1. Identifies the caller's reply destination. Only required
    /// when `reply_queue_id` is non-empty.
    pub client_token: String,
    /// Field 2. Non-empty means the caller wants a reply on this queue.
    pub reply_queue_id: String,
    /// Field 3. Opaque, passed through to the reply unchanged.
    pub correlation_id: String,
    /// Field 4. Forward-slash-delimited route, e.g. `/api/pkg/version/route`.
    pub path: String,
    /// Field 5. Raw request bytes, interpreted by the handler as text.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl CallEnvelope {
    /// Whether the caller asked for a reply.
    #[must_use]
    pub fn wants_reply(&self) -> bool {
        !self.reply_queue_id.is_empty()
    }
}

/// The reply sent back to a caller's reply queue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Field 1.
    pub client_token: String,
    /// Field 2.
    pub reply_queue_id: String,
    /// Field 3.
    pub correlation_id: String,
    /// Field 4. The handler's textual result.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Field 5. Reserved; encoded as `nil` while unset.
    pub error_text: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decodes a queue message body into a [`CallEnvelope`].
///
/// # Errors
///
/// Returns `EnvelopeError::Decode` if `bytes` is not a well-formed call envelope.
pub fn decode_call(bytes: &[u8]) -> Result<CallEnvelope, EnvelopeError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encodes a [`CallEnvelope`] for sending to the gateway queue.
///
/// # Errors
///
/// Returns `EnvelopeError::Encode` if serialization fails.
pub fn encode_call(envelope: &CallEnvelope) -> Result<Vec<u8>, EnvelopeError> {
    Ok(rmp_serde::to_vec(envelope)?)
}

/// Decodes a reply body into a [`ResultEnvelope`].
///
/// # Errors
///
/// Returns `EnvelopeError::Decode` if `bytes` is not a well-formed result envelope.
pub fn decode_result(bytes: &[u8]) -> Result<ResultEnvelope, EnvelopeError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encodes a [`ResultEnvelope`]. Identical field values always produce
/// identical bytes.
///
/// # Errors
///
/// Returns `EnvelopeError::Encode` if serialization fails.
pub fn encode_result(envelope: &ResultEnvelope) -> Result<Vec<u8>, EnvelopeError> {
    Ok(rmp_serde::to_vec(envelope)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

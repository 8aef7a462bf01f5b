//! Shared error types.

use crate::protocol::EnvelopeKind;

/// Failure to decode or encode a feed frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a JSON envelope with a `type` field.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The envelope kind is known but its payload has the wrong shape.
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: EnvelopeKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

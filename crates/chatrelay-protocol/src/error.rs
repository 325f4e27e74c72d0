//! Error types for the protocol layer.
//!
//! Each crate in chatrelay defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in turning records into
//! envelopes (or back), not in networking or roster bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into an envelope).
    ///
    /// Common causes: malformed JSON, a missing `body` field, or a
    /// client speaking the plain-text format to a JSON server.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The record is invalid at the protocol level, e.g. not UTF-8 or an
    /// out-of-range timestamp.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

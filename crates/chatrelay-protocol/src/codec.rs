//! Codec trait and implementations for turning envelopes into records.
//!
//! A "codec" (coder/decoder) converts between an [`Envelope`] and the raw
//! bytes of one transport record. The server doesn't care HOW envelopes
//! are serialized; it just needs something that implements [`Codec`].
//!
//! Two codecs ship with the crate:
//! - [`JsonCodec`]: one JSON object per record, for GUI clients that
//!   want the structured envelope.
//! - [`PlainTextCodec`]: the record IS the body, for people typing into
//!   netcat or telnet.
//!
//! Server-to-client traffic is always plain text lines; the codec only
//! governs what clients send.

use crate::{Envelope, ProtocolError};

/// Encodes envelopes to record bytes and decodes them back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every session task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one record.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one record into an envelope.
    ///
    /// # Errors
    /// Returns a decode error if the bytes are malformed or not UTF-8, and
    /// `ProtocolError::InvalidMessage` if the body holds a line break.
    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use chatrelay_protocol::{Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Envelope::new("/connect Steve")).unwrap();
/// assert_eq!(bytes, br#"{"body":"/connect Steve"}"#);
///
/// let decoded = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_command());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        serde_json::from_slice::<Envelope>(data)
            .map_err(ProtocolError::Decode)?
            .single_line()
    }
}

// ---------------------------------------------------------------------------
// PlainTextCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] where the whole record is the envelope body.
///
/// Encoding drops the timestamp and sender; decoding never has any.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl Codec for PlainTextCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        Ok(envelope.body.as_bytes().to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        let body = std::str::from_utf8(data).map_err(|e| {
            ProtocolError::InvalidMessage(format!("record is not UTF-8: {e}"))
        })?;
        Envelope::new(body).single_line()
    }
}

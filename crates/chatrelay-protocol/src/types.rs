//! Core protocol types for chatrelay's wire format.
//!
//! A client sends an [`Envelope`] carrying just the text it typed. The
//! server never trusts client metadata: on receipt it overwrites the
//! timestamp and sender label via [`Envelope::stamp`], and from then on
//! the envelope is only read, never changed.

use std::fmt;

use chrono::Timelike;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{COMMAND_SIGIL, ProtocolError};

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Wall-clock time of day at minute resolution, rendered as `HH:MM`.
///
/// On the wire it is the bare string (`"09:05"`), not a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    hour: u8,
    minute: u8,
}

impl Timestamp {
    /// Builds a timestamp, rejecting hours above 23 and minutes above 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ProtocolError> {
        if hour > 23 || minute > 59 {
            return Err(ProtocolError::InvalidMessage(format!(
                "timestamp out of range: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// The server's local time right now.
    pub fn now() -> Self {
        Self::from_time(chrono::Local::now().time())
    }

    /// Truncates any `chrono` time-of-day to minute resolution.
    pub fn from_time(time: impl Timelike) -> Self {
        // chrono guarantees hour < 24 and minute < 60.
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ProtocolError::InvalidMessage(format!("bad timestamp: {s:?}"));
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One unit of chat payload plus server-assigned metadata.
///
/// `timestamp` and `sender` are optional on the wire so a client can send
/// `{"body": "hi"}`. Whatever a client puts there is discarded by
/// [`stamp`](Self::stamp), so a value of the wrong shape decodes to `None`
/// instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<Timestamp>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_sender"
    )]
    pub sender: Option<String>,
    pub body: String,
}

/// Any JSON value, keeping it only if it is a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Other(IgnoredAny),
}

impl Loose {
    fn into_text(self) -> Option<String> {
        match self {
            Loose::Text(text) => Some(text),
            Loose::Other(_) => None,
        }
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Loose::deserialize(deserializer)?
        .into_text()
        .and_then(|text| text.parse().ok()))
}

fn lenient_sender<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Loose::deserialize(deserializer)?.into_text())
}

impl Envelope {
    /// An unstamped envelope, as a client would build it.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            sender: None,
            body: body.into(),
        }
    }

    /// Replaces any client-supplied metadata with the server's.
    pub fn stamp(self, at: Timestamp, sender: impl Into<String>) -> Self {
        Self {
            timestamp: Some(at),
            sender: Some(sender.into()),
            body: self.body,
        }
    }

    /// Rejects a body containing a line break.
    ///
    /// Every server-to-client line is newline-terminated, so a body with an
    /// embedded `\n` or `\r` would let a client inject extra protocol
    /// lines (`/updatelist`, `/disconnect`) into other clients' streams.
    pub fn single_line(self) -> Result<Self, ProtocolError> {
        if self.body.contains(['\n', '\r']) {
            return Err(ProtocolError::InvalidMessage(
                "body contains a line break".to_string(),
            ));
        }
        Ok(self)
    }

    /// True when the body starts with the command sigil.
    pub fn is_command(&self) -> bool {
        self.body.starts_with(COMMAND_SIGIL)
    }

    /// The body without its leading sigil, if it is a command.
    pub fn command_text(&self) -> Option<&str> {
        self.body.strip_prefix(COMMAND_SIGIL)
    }

    /// Renders the envelope as the line peers see: `(HH:MM) sender : body`.
    pub fn chat_line(&self) -> String {
        let ts = self
            .timestamp
            .map(|t| t.to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let sender = self.sender.as_deref().unwrap_or("?");
        format!("({ts}) {sender} : {}", self.body)
    }
}

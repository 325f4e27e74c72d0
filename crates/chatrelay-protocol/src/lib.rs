//! Wire protocol for chatrelay.
//!
//! This crate defines the "language" that chat clients and the relay speak:
//!
//! - **Types** ([`Envelope`], [`Timestamp`]): the chat payload a client
//!   sends, plus the metadata the server stamps onto it.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`PlainTextCodec`]): how
//!   an envelope is turned into one transport record and back.
//! - **Commands** ([`Command`], [`CommandError`]): the leading-slash
//!   grammar and the replies its failures produce.
//! - **Lines** ([`lines`]): every text line the server pushes to clients.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw records) and the roster
//! (who is connected). It doesn't know about connections or locks. It
//! only knows how to parse, stamp, and render messages.
//!
//! ```text
//! Transport (records) → Protocol (Envelope, Command) → Roster / Server
//! ```

mod codec;
mod command;
mod error;
pub mod lines;
mod types;

pub use codec::{Codec, PlainTextCodec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::{COMMAND_SIGIL, Command, CommandError};
pub use error::ProtocolError;
pub use types::{Envelope, Timestamp};

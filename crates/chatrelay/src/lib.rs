//! # Chatrelay
//!
//! Multi-user text chat relay server.
//!
//! Clients connect over TCP (one line per record) or WebSocket (one text
//! frame per record), pick a display name with `/connect`, and everything
//! they type that is not a command is stamped and relayed to everyone.
//! The server keeps a single roster of connected users, enforces unique
//! names, and delivers whispers, emotes, and directory updates.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn start() -> Result<(), ChatRelayError> {
//! let server = ChatRelayServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build_tcp(PlainTextCodec)
//!     .await?;
//! let handle = server.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.shutdown().await;
//! });
//! server.run().await
//! # }
//! ```

mod chatlog;
mod command;
mod config;
mod error;
mod handler;
mod help;
mod server;

pub use chatlog::{ChatLog, FileChatLog, NullChatLog};
pub use config::{
    ConfigError, DEFAULT_PORT, FileConfig, ServerConfig, TransportKind, WireFormat, load_config,
};
pub use error::ChatRelayError;
pub use help::{HelpViewer, TracingHelpViewer};
pub use server::{ChatRelayServer, ChatRelayServerBuilder, ServerHandle};

pub mod prelude {
    pub use crate::{
        ChatLog, ChatRelayError, ChatRelayServer, ChatRelayServerBuilder, FileChatLog,
        HelpViewer, NullChatLog, ServerConfig, ServerHandle, TracingHelpViewer,
        TransportKind, WireFormat,
    };
    pub use chatrelay_protocol::{Codec, Envelope, JsonCodec, PlainTextCodec};
    pub use chatrelay_transport::{TcpTransport, Transport, WebSocketTransport};
}

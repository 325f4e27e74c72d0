//! Roster and broadcast bus for chatrelay.
//!
//! This crate tracks who is in the channel and how to reach them:
//!
//! 1. **Outbound writers**: a per-connection, non-blocking line sink
//!    ([`OutboundWriter`]) drained by that connection's writer task
//! 2. **Roster**: identity → (display name, origin, writer), with name
//!    uniqueness enforced on every insert and rename ([`Roster`])
//! 3. **Broadcast bus**: best-effort delivery of one line to everyone,
//!    or to exactly one writer ([`Roster::broadcast`], [`unicast`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← owns the roster behind one lock, runs sessions
//!     ↕
//! Roster Layer (this crate)  ← names, writers, fan-out
//!     ↕
//! Protocol / Transport (below)  ← line builders, ConnectionId
//! ```

mod bus;
mod error;
mod roster;
mod writer;

pub use bus::{Delivery, unicast};
pub use error::RosterError;
pub use roster::{CLONE_SUFFIX, Roster, RosterEntry, validate_name};
pub use writer::{Outbound, OutboundReceiver, OutboundWriter};

//! Error types for the roster layer.

use chatrelay_transport::ConnectionId;

/// Errors that can occur during roster bookkeeping and delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// The requested name already belongs to a different live identity.
    #[error("name {0} is already in use")]
    NameConflict(String),

    /// `register` was called twice for one identity. The server only
    /// registers after checking, so this marks a bug in the caller.
    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// No entry exists for the identity.
    #[error("{0} is not registered")]
    NotRegistered(ConnectionId),

    /// Names must be non-empty and free of commas and whitespace.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// The target's writer task is gone, so the line was dropped.
    #[error("delivery to {0} failed")]
    PeerIoFailure(ConnectionId),
}

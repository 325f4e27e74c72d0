//! Unified error type for the chatrelay server.

use chatrelay_protocol::ProtocolError;
use chatrelay_roster::RosterError;
use chatrelay_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// Only startup can fail with one of these (binding, config, opening the
/// chat log). Once running, per-session failures are handled inside the
/// session and never reach the accept loop. The `#[from]` attribute on
/// each variant auto-generates `From` impls, so `?` converts sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatRelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A roster-level error (name conflict, unknown identity).
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// A bad configuration value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local I/O, e.g. opening the chat log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use chatrelay_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ReceiveFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "gone",
        ));
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Transport(_)));
        assert!(relay_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Protocol(_)));
    }

    #[test]
    fn test_from_roster_error() {
        let err = RosterError::NotRegistered(ConnectionId::new(1));
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Roster(_)));
        assert!(relay_err.to_string().contains("conn-1"));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid(Box::new(figment::Error::from(
            "port must be a number".to_string(),
        )));
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Config(_)));
        assert!(relay_err.to_string().contains("port must be a number"));
    }
}

// ABOUTME: Error types for the vigil-agent crate.
// ABOUTME: Everything here is retryable via the reconnect supervisor.

use thiserror::Error;
use vigil_proto::WireError;

/// Errors that can end a single agent session.
///
/// None of these are fatal to the agent process; the supervisor logs them
/// and retries with backoff. `AuthFailed` is retryable too since the shared
/// secret might be fixed by a redeploy.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Discovery timed out and no fallback address was configured.
    #[error("no server found via discovery")]
    NoServerFound,

    /// Could not open the transport connection.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The server rejected or never answered our auth message.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The server sent something other than the handshake allows.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Codec or transport failure on the established connection.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Socket-level failure outside the framed transport.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            AgentError::NoServerFound.to_string(),
            "no server found via discovery"
        );
        assert_eq!(
            AgentError::AuthFailed("bad token".into()).to_string(),
            "authentication failed: bad token"
        );
        assert_eq!(
            AgentError::ProtocolViolation("expected auth_ok, got error".into()).to_string(),
            "protocol violation: expected auth_ok, got error"
        );
    }

    #[test]
    fn from_wire_error() {
        let err: AgentError = WireError::ConnectionClosed.into();
        assert!(matches!(err, AgentError::Wire(WireError::ConnectionClosed)));
    }
}

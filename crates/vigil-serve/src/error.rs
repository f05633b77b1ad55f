// ABOUTME: Error types for the vigil-serve crate.
// ABOUTME: Per-connection failures only; nothing here is fatal to the process.

use thiserror::Error;
use vigil_proto::WireError;

/// Errors raised while serving connections and dispatching requests.
#[derive(Error, Debug)]
pub enum ServeError {
    /// `send_request` was addressed to an id with no live connection.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// The client's write channel is gone (connection tearing down).
    #[error("client connection closed: {0}")]
    ClientGone(String),

    /// The client's send queue is at capacity. The connection is still up.
    #[error("client send queue full: {0}")]
    ClientBusy(String),

    /// A connection broke the handshake rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Codec or framed-transport failure.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Socket-level failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

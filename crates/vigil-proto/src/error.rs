// ABOUTME: Error types for the vigil-proto crate.
// ABOUTME: Covers codec failures and transport-level stream conditions.

use thiserror::Error;

/// Errors produced by the wire codec and the framed transport helpers.
#[derive(Error, Debug)]
pub enum WireError {
    /// The line was not a valid message. Callers drop the line and keep
    /// reading; this is only fatal during handshake.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The `type` field named a message kind this build does not know.
    /// Callers log and ignore these.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The peer or the local writer task has gone away.
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound channel is at capacity. The connection is still up;
    /// the caller can retry or drop the frame.
    #[error("send queue full")]
    SendQueueFull,

    /// Underlying socket failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Malformed(err.to_string())
    }
}

impl WireError {
    /// True for errors a read loop should swallow (drop the line, continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WireError::Malformed(_) | WireError::UnknownType(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = WireError::Malformed("bad json".to_string());
        assert_eq!(err.to_string(), "malformed message: bad json");

        let err = WireError::UnknownType("gossip".to_string());
        assert_eq!(err.to_string(), "unknown message type: gossip");

        let err = WireError::ConnectionClosed;
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn recoverable_classification() {
        assert!(WireError::Malformed("x".into()).is_recoverable());
        assert!(WireError::UnknownType("x".into()).is_recoverable());
        assert!(!WireError::ConnectionClosed.is_recoverable());
        assert!(!WireError::SendQueueFull.is_recoverable());
        let io = WireError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!io.is_recoverable());
    }

    #[test]
    fn from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: WireError = parse_err.into();
        assert!(matches!(err, WireError::Malformed(_)));
    }
}

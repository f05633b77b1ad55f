// ABOUTME: Library surface of the vigil collector server.
// ABOUTME: Registry, correlator, connection handling, discovery responder, and runtime.

pub mod connection;
pub mod console;
pub mod discovery;
pub mod error;
pub mod observer;
pub mod pending;
pub mod registry;
pub mod server;

pub use error::ServeError;
pub use observer::{ObserverHub, ResponseEvent};
pub use pending::{PendingResponse, PendingResponses};
pub use registry::{ClientInfo, Registry};
pub use server::{Server, ServerState};

use std::time::Duration;

use vigil_proto::{DEFAULT_AUTH_TOKEN, TCP_SERVER_PORT, UDP_DISCOVERY_PORT};

/// How long a new connection gets to present its auth frame.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// How many pending responses are retained before the oldest are evicted.
pub const PENDING_CAPACITY: usize = 256;

/// Configuration for the collector server.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Address to bind the TCP listener on.
    pub host: String,
    /// TCP port agents connect to.
    pub port: u16,
    /// Address to bind the UDP discovery responder on.
    pub udp_bind: String,
    /// UDP discovery port.
    pub udp_port: u16,
    /// Shared secret agents must present, compared by exact match.
    pub auth_token: String,
    /// Bound on the wait for a connection's auth frame.
    pub auth_timeout: Duration,
    /// Bound on the pending-response store.
    pub pending_capacity: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: TCP_SERVER_PORT,
            udp_bind: "0.0.0.0".to_string(),
            udp_port: UDP_DISCOVERY_PORT,
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
            auth_timeout: AUTH_TIMEOUT,
            pending_capacity: PENDING_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServeConfig::default();
        assert_eq!(config.port, 9009);
        assert_eq!(config.udp_port, 9999);
        assert_eq!(config.pending_capacity, 256);
    }
}

// ABOUTME: Agent configuration.
// ABOUTME: Server address, identity, shared secret, and cadence settings.

use std::time::Duration;

use vigil_proto::{new_client_id, DEFAULT_AUTH_TOKEN, TCP_SERVER_PORT};

/// Default interval between heartbeat messages.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Default interval between metrics messages. Independent of the heartbeat
/// cadence even though the defaults coincide.
pub const METRICS_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for the server's auth reply before treating the
/// handshake as failed.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for one agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Collector host to connect to (configured or discovered).
    pub server_host: String,
    /// Collector TCP port.
    pub server_port: u16,
    /// Shared secret, compared by exact match on the server.
    pub auth_token: String,
    /// Human label for this agent. Not required to be unique.
    pub name: String,
    /// Stable identity token. Immutable for the life of a connection.
    pub client_id: String,
    pub heartbeat_interval: Duration,
    pub metrics_interval: Duration,
    pub auth_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: TCP_SERVER_PORT,
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
            name: "agent".to_string(),
            client_id: new_client_id(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            metrics_interval: METRICS_INTERVAL,
            auth_timeout: AUTH_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.server_port, 9009);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(config.metrics_interval, Duration::from_secs(2));
        assert!(!config.client_id.is_empty());
    }

    #[test]
    fn default_ids_differ_per_config() {
        let a = AgentConfig::default();
        let b = AgentConfig::default();
        assert_ne!(a.client_id, b.client_id);
    }
}

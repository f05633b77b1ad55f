// ABOUTME: Discovery protocol constants and reply type.
// ABOUTME: Stateless UDP broadcast exchange used by agents to locate a server.

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Magic token an agent broadcasts to find a server. Exact-match, no auth;
/// discovery only reveals how to reach a server, never secrets.
pub const DISCOVERY_MAGIC: &[u8] = b"DISCOVER_PC_MONITOR";

/// Reply sent to a discovering agent, naming the TCP port to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    pub tcp_port: u16,
}

impl DiscoveryReply {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// True when a datagram payload is a discovery probe.
pub fn is_probe(data: &[u8]) -> bool {
    // Tolerate trailing whitespace from hand-driven probes (netcat etc.)
    trim_ascii(data) == DISCOVERY_MAGIC
}

fn trim_ascii(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &data[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_roundtrip() {
        let reply = DiscoveryReply { tcp_port: 9009 };
        let bytes = reply.encode().unwrap();
        assert_eq!(DiscoveryReply::decode(&bytes).unwrap(), reply);
    }

    #[test]
    fn reply_wire_shape() {
        let bytes = DiscoveryReply { tcp_port: 4321 }.encode().unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw, serde_json::json!({"tcp_port": 4321}));
    }

    #[test]
    fn probe_matching() {
        assert!(is_probe(b"DISCOVER_PC_MONITOR"));
        assert!(is_probe(b"DISCOVER_PC_MONITOR\n"));
        assert!(is_probe(b"  DISCOVER_PC_MONITOR  "));
        assert!(!is_probe(b"DISCOVER_PC_MONITOR_V2"));
        assert!(!is_probe(b"hello"));
        assert!(!is_probe(b""));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(DiscoveryReply::decode(b"not json").is_err());
    }
}

// ABOUTME: UDP broadcast discovery client.
// ABOUTME: Finds a collector on the local network without a configured address.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use vigil_proto::{DiscoveryReply, DISCOVERY_MAGIC, UDP_DISCOVERY_PORT};

use crate::error::AgentError;

/// Bound on the discovery exchange. Expiry means "no server found".
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Broadcast a discovery probe on the LAN and wait for the first reply.
///
/// Returns `Ok(None)` on timeout; the caller decides whether to fall back
/// to a configured address. Only socket setup failures are errors.
pub async fn discover_server(timeout: Duration) -> Result<Option<SocketAddr>, AgentError> {
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, UDP_DISCOVERY_PORT));
    discover_server_at(target, timeout).await
}

/// Probe a specific discovery endpoint. Split out so tests can target a
/// responder on an ephemeral port instead of the broadcast address.
pub async fn discover_server_at(
    target: SocketAddr,
    timeout: Duration,
) -> Result<Option<SocketAddr>, AgentError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(DISCOVERY_MAGIC, target).await?;

    let mut buf = [0u8; 2048];
    // First reply wins; the socket is dropped as soon as we return.
    match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
        Err(_) => {
            debug!(?target, "discovery timed out");
            Ok(None)
        }
        Ok(Err(err)) => Err(err.into()),
        Ok(Ok((n, from))) => match DiscoveryReply::decode(&buf[..n]) {
            Ok(reply) => {
                debug!(%from, tcp_port = reply.tcp_port, "discovered server");
                Ok(Some(SocketAddr::new(from.ip(), reply.tcp_port)))
            }
            Err(err) => {
                warn!(%from, %err, "ignoring malformed discovery reply");
                Ok(None)
            }
        },
    }
}

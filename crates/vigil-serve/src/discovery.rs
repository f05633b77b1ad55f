// ABOUTME: UDP discovery responder.
// ABOUTME: Answers magic probes with the TCP port agents should connect to.

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use vigil_proto::{is_probe, DiscoveryReply};

use crate::error::ServeError;

/// Answer discovery probes forever.
///
/// Any datagram that is not the magic probe is ignored. The reply carries
/// the TCP port this server is actually listening on.
pub async fn run_responder(socket: UdpSocket, tcp_port: u16) -> Result<(), ServeError> {
    if let Ok(addr) = socket.local_addr() {
        info!(%addr, tcp_port, "discovery responder listening");
    }
    let reply = DiscoveryReply { tcp_port }.encode()?;
    let mut buf = [0u8; 1024];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        if !is_probe(&buf[..len]) {
            debug!(%peer, len, "ignoring non-probe datagram");
            continue;
        }
        debug!(%peer, "answering discovery probe");
        if let Err(err) = socket.send_to(&reply, peer).await {
            warn!(%peer, error = %err, "failed to answer probe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn answers_probe_with_tcp_port() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let responder_addr = responder.local_addr().unwrap();
        tokio::spawn(run_responder(responder, 4242));

        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe
            .send_to(vigil_proto::DISCOVERY_MAGIC, responder_addr)
            .await
            .unwrap();

        let mut buf = [0u8; 256];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), probe.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from, responder_addr);
        let reply = DiscoveryReply::decode(&buf[..len]).unwrap();
        assert_eq!(reply.tcp_port, 4242);
    }

    #[tokio::test]
    async fn ignores_junk_datagrams() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let responder_addr = responder.local_addr().unwrap();
        tokio::spawn(run_responder(responder, 4242));

        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe.send_to(b"HELLO", responder_addr).await.unwrap();
        probe
            .send_to(vigil_proto::DISCOVERY_MAGIC, responder_addr)
            .await
            .unwrap();

        // The junk datagram produces no reply; the probe right after does.
        let mut buf = [0u8; 256];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), probe.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(DiscoveryReply::decode(&buf[..len]).is_ok());
    }
}

// ABOUTME: Server runtime: bind sockets, accept loop, discovery task, shutdown.
// ABOUTME: ServerState is the shared handle every connection handler and console clones.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, UdpSocket};
use tokio::signal;
use tracing::{info, warn};

use crate::connection;
use crate::discovery;
use crate::observer::ObserverHub;
use crate::pending::PendingResponses;
use crate::registry::Registry;
use crate::ServeConfig;

/// Shared server state, cloned into every connection handler.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Registry,
    pub pending: PendingResponses,
    pub observers: ObserverHub,
    pub config: Arc<ServeConfig>,
}

impl ServerState {
    pub fn new(config: ServeConfig) -> Self {
        let pending = PendingResponses::new(config.pending_capacity);
        Self {
            registry: Registry::new(),
            pending,
            observers: ObserverHub::new(),
            config: Arc::new(config),
        }
    }
}

/// A bound but not yet running collector server.
pub struct Server {
    state: ServerState,
    listener: TcpListener,
    udp_socket: UdpSocket,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the TCP listener and UDP discovery socket.
    ///
    /// Port 0 is honored for both, so tests can run on ephemeral ports and
    /// read the actual address back via [`Server::local_addr`].
    pub async fn bind(config: ServeConfig) -> Result<Self> {
        let tcp_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&tcp_addr)
            .await
            .with_context(|| format!("binding TCP listener on {tcp_addr}"))?;
        let local_addr = listener.local_addr().context("reading listener address")?;

        let udp_addr = format!("{}:{}", config.udp_bind, config.udp_port);
        let udp_socket = UdpSocket::bind(&udp_addr)
            .await
            .with_context(|| format!("binding UDP discovery socket on {udp_addr}"))?;

        Ok(Self {
            state: ServerState::new(config),
            listener,
            udp_socket,
            local_addr,
        })
    }

    /// Address the TCP listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared state handle for consoles, dashboards, and tests.
    pub fn state(&self) -> ServerState {
        self.state.clone()
    }

    /// Run the accept loop and discovery responder until shutdown.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr, "collector listening");

        // The responder advertises the port we actually bound, which may
        // differ from the configured one when port 0 was requested.
        let tcp_port = self.local_addr.port();
        let udp_socket = self.udp_socket;
        tokio::spawn(async move {
            if let Err(err) = discovery::run_responder(udp_socket, tcp_port).await {
                warn!(error = %err, "discovery responder stopped");
            }
        });

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let state = self.state.clone();
                            tokio::spawn(connection::handle(stream, peer, state));
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
                _ = shutdown_signal() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
    }
}

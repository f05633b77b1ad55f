// ABOUTME: vigil-agent entry point.
// ABOUTME: Parses flags, resolves the server by config or discovery, and runs the session.

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use vigil_agent::config::AgentConfig;
use vigil_agent::discover::{discover_server, DISCOVERY_TIMEOUT};
use vigil_agent::providers::Providers;
use vigil_agent::session;
use vigil_proto::{new_client_id, DEFAULT_AUTH_TOKEN, TCP_SERVER_PORT};

#[derive(Parser, Debug)]
#[command(name = "vigil-agent", about = "vigil monitoring agent")]
struct Args {
    /// Collector host. Leave empty to rely on discovery.
    #[arg(long, default_value = "")]
    server_host: String,

    /// Collector TCP port.
    #[arg(long, default_value_t = TCP_SERVER_PORT)]
    server_port: u16,

    /// Use UDP broadcast discovery to find a server.
    #[arg(long)]
    discover: bool,

    /// Shared secret presented at handshake.
    #[arg(long, env = "VIGIL_AUTH_TOKEN", default_value = DEFAULT_AUTH_TOKEN)]
    auth_token: String,

    /// Human label for this agent. Defaults to the hostname.
    #[arg(long)]
    name: Option<String>,

    /// Stable client identity. Generated fresh when omitted.
    #[arg(long)]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    vigil_log::init();
    let args = Args::parse();

    let name = args.name.unwrap_or_else(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    });
    let client_id = args.client_id.unwrap_or_else(new_client_id);

    let (server_host, server_port) = if args.discover || args.server_host.is_empty() {
        match discover_server(DISCOVERY_TIMEOUT).await? {
            Some(addr) => {
                info!(%addr, "discovered server");
                (addr.ip().to_string(), addr.port())
            }
            None if args.server_host.is_empty() => {
                bail!(
                    "could not discover a server; pass --server-host or ensure \
                     LAN broadcast works"
                );
            }
            None => {
                info!(
                    host = %args.server_host,
                    "discovery found nothing, falling back to configured address"
                );
                (args.server_host, args.server_port)
            }
        }
    } else {
        (args.server_host, args.server_port)
    };

    let config = AgentConfig {
        server_host,
        server_port,
        auth_token: args.auth_token,
        name,
        client_id,
        ..AgentConfig::default()
    };
    let providers = Providers::system();

    tokio::select! {
        _ = session::run_forever(config, providers) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

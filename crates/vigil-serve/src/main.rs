// ABOUTME: vigil-serve entry point.
// ABOUTME: Binds the collector and runs it with or without the operator console.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use vigil_proto::{DEFAULT_AUTH_TOKEN, TCP_SERVER_PORT, UDP_DISCOVERY_PORT};
use vigil_serve::{console, Server, ServeConfig};

#[derive(Parser, Debug)]
#[command(name = "vigil-serve", about = "vigil collector server")]
struct Args {
    /// Address to bind the TCP listener on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port agents connect to.
    #[arg(long, default_value_t = TCP_SERVER_PORT)]
    port: u16,

    /// Address to bind the UDP discovery responder on.
    #[arg(long, default_value = "0.0.0.0")]
    udp_bind: String,

    /// UDP discovery port.
    #[arg(long, default_value_t = UDP_DISCOVERY_PORT)]
    udp_port: u16,

    /// Shared secret agents must present.
    #[arg(long, env = "VIGIL_AUTH_TOKEN", default_value = DEFAULT_AUTH_TOKEN)]
    auth_token: String,

    /// Run without the interactive console.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    vigil_log::init();
    let args = Args::parse();

    let config = ServeConfig {
        host: args.host,
        port: args.port,
        udp_bind: args.udp_bind,
        udp_port: args.udp_port,
        auth_token: args.auth_token,
        ..ServeConfig::default()
    };

    let server = Server::bind(config).await?;
    let state = server.state();

    if args.headless {
        server.run().await
    } else {
        tokio::select! {
            result = server.run() => result,
            result = console::run(state) => {
                info!("console closed, shutting down");
                result
            }
        }
    }
}

// ABOUTME: Interactive operator console on stdin/stdout.
// ABOUTME: list / req / help / quit, plus a printer for correlated responses.

use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::error::ServeError;
use crate::server::ServerState;

const HELP: &str = "commands:
  list                      show connected agents
  req <client_id> <type>    send a request (sysinfo | processes | netstat)
  help                      show this help
  quit                      stop the console";

/// Drive the operator console until EOF or `quit`.
///
/// Responses are printed as they arrive, whichever command is in flight.
pub async fn run(state: ServerState) -> Result<()> {
    let mut responses = state.observers.subscribe();
    tokio::spawn(async move {
        while let Some(event) = responses.recv().await {
            println!(
                "[response] client={} request_id={} payload={}",
                event.client_id, event.request_id, event.payload
            );
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_request = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("list") => {
                let clients = state.registry.snapshot();
                if clients.is_empty() {
                    println!("no agents connected");
                    continue;
                }
                for client in clients {
                    let metrics = &client.last_metrics;
                    println!(
                        "{:<14} {:<16} {:<21} seen {:>5.1}s ago  cpu={} mem={} disk={}",
                        client.client_id,
                        client.name,
                        client.addr,
                        client.age.as_secs_f64(),
                        fmt_pct(metrics.cpu_percent),
                        fmt_pct(metrics.mem_percent),
                        fmt_pct(metrics.disk_percent),
                    );
                }
            }
            Some("req") => {
                let (Some(client_id), Some(req_type)) = (parts.next(), parts.next()) else {
                    println!("usage: req <client_id> <type>");
                    continue;
                };
                next_request += 1;
                let request_id = format!("r{next_request}");
                match state
                    .registry
                    .send_request(client_id, req_type, &request_id, json!({}))
                {
                    Ok(()) => println!("sent {request_id} ({req_type}) to {client_id}"),
                    Err(err @ ServeError::ClientNotFound(_)) => println!("{err}"),
                    Err(err) => {
                        warn!(client_id, error = %err, "request not delivered");
                        println!("{err}");
                    }
                }
            }
            Some("help") => println!("{HELP}"),
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command: {other} (try `help`)"),
            None => {}
        }
    }

    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => "-".to_string(),
    }
}

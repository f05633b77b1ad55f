// ABOUTME: Agent session state machine and reconnect supervisor.
// ABOUTME: Connect, authenticate, then run send/receive duties until either fails.

use serde_json::json;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vigil_proto::stream::DEFAULT_CHANNEL_BUFFER;
use vigil_proto::{
    spawn_writer, AuthPayload, Frame, FrameReader, FrameSender, HeartbeatPayload, Message,
};

use crate::backoff::Backoff;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::providers::Providers;

/// An authenticated connection, ready for the Active state.
struct Connection {
    sender: FrameSender,
    reader: FrameReader<OwnedReadHalf>,
    writer_handle: JoinHandle<()>,
}

/// Supervise the session forever: connect, run, back off, repeat.
///
/// The backoff resets as soon as a session reaches Active, so an agent that
/// held a connection for hours retries promptly when it drops.
pub async fn run_forever(config: AgentConfig, providers: Providers) {
    let mut backoff = Backoff::default();
    loop {
        match connect_and_auth(&config, &providers).await {
            Ok(connection) => {
                info!(
                    host = %config.server_host,
                    port = config.server_port,
                    client_id = %config.client_id,
                    "connected and authenticated"
                );
                backoff.reset();
                match run_active(connection, &config, &providers).await {
                    Ok(()) => info!("server closed the connection"),
                    Err(err) => warn!(%err, "session ended"),
                }
            }
            Err(err) => warn!(%err, "connection attempt failed"),
        }

        let delay = backoff.next_delay();
        info!(delay_ms = delay.as_millis() as u64, "reconnecting after delay");
        tokio::time::sleep(delay).await;
    }
}

/// Run a single session to completion: connect, authenticate, go Active.
///
/// Returns `Ok(())` when the server closes the connection cleanly.
pub async fn run_once(config: &AgentConfig, providers: &Providers) -> Result<(), AgentError> {
    let connection = connect_and_auth(config, providers).await?;
    run_active(connection, config, providers).await
}

async fn connect_and_auth(
    config: &AgentConfig,
    providers: &Providers,
) -> Result<Connection, AgentError> {
    let stream = TcpStream::connect((config.server_host.as_str(), config.server_port))
        .await
        .map_err(|err| AgentError::ConnectFailed(err.to_string()))?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let (sender, writer_handle) = spawn_writer(write_half, DEFAULT_CHANNEL_BUFFER);

    let auth = Message::Auth(AuthPayload {
        token: config.auth_token.clone(),
        client_id: config.client_id.clone(),
        name: config.name.clone(),
        sysinfo: providers.sysinfo.describe(),
    });
    sender.send(Frame::new(auth)).await?;

    let reply = match tokio::time::timeout(config.auth_timeout, reader.next()).await {
        Err(_) => return Err(AgentError::AuthFailed("timed out waiting for reply".into())),
        Ok(Err(err)) => {
            // Malformed input during handshake is fatal for this attempt.
            return Err(AgentError::AuthFailed(err.to_string()));
        }
        Ok(Ok(None)) => return Err(AgentError::AuthFailed("server closed during auth".into())),
        Ok(Ok(Some(frame))) => frame,
    };

    match reply.message {
        Message::AuthOk(ok) => {
            debug!(server_time = ok.server_time, "auth accepted");
            Ok(Connection {
                sender,
                reader,
                writer_handle,
            })
        }
        Message::Error(err) => Err(AgentError::AuthFailed(err.reason)),
        other => Err(AgentError::ProtocolViolation(format!(
            "expected auth_ok, got {}",
            other.kind()
        ))),
    }
}

/// The Active state: two duties racing under select. Whichever ends first
/// cancels the other; the writer task drains once both senders are gone.
async fn run_active(
    connection: Connection,
    config: &AgentConfig,
    providers: &Providers,
) -> Result<(), AgentError> {
    let Connection {
        sender,
        mut reader,
        writer_handle,
    } = connection;

    let result = tokio::select! {
        r = send_loop(&sender, config, providers) => r,
        r = recv_loop(&mut reader, &sender, providers) => r,
    };

    drop(sender);
    let _ = writer_handle.await;
    result
}

/// Send duty: heartbeat and metrics on independent fixed intervals.
async fn send_loop(
    sender: &FrameSender,
    config: &AgentConfig,
    providers: &Providers,
) -> Result<(), AgentError> {
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    let mut metrics = tokio::time::interval(config.metrics_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    metrics.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                sender
                    .send(Frame::new(Message::Heartbeat(HeartbeatPayload::now())))
                    .await?;
            }
            _ = metrics.tick() => {
                let sample = providers.metrics.sample();
                sender.send(Frame::new(Message::Metrics(sample))).await?;
            }
        }
    }
}

/// Receive duty: answer requests, ignore everything else, drop bad lines.
async fn recv_loop(
    reader: &mut FrameReader<OwnedReadHalf>,
    sender: &FrameSender,
    providers: &Providers,
) -> Result<(), AgentError> {
    loop {
        let frame = match reader.next().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(err) if err.is_recoverable() => {
                warn!(%err, "dropping inbound line");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match frame.message {
            Message::Request {
                request_id,
                payload,
            } => {
                let body = match providers
                    .diagnostics
                    .handle(&payload.req_type, &payload.data)
                    .await
                {
                    Some(value) => value,
                    None => json!({ "error": format!("unknown req_type: {}", payload.req_type) }),
                };
                sender
                    .send(Frame::new(Message::Response {
                        request_id,
                        payload: body,
                    }))
                    .await?;
            }
            other => debug!(kind = other.kind(), "ignoring message"),
        }
    }
}

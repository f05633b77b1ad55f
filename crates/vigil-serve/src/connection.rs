// ABOUTME: Per-connection handler: auth gate, then the active dispatch loop.
// ABOUTME: One task per accepted socket; registry entry lives exactly as long as the session.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use vigil_proto::{
    spawn_writer, AuthOkPayload, AuthPayload, ErrorPayload, Frame, FrameReader, FrameSender,
    Message, WireError, DEFAULT_CHANNEL_BUFFER, PROTOCOL_VERSION,
};

use crate::observer::ResponseEvent;
use crate::server::ServerState;

/// Drive one agent connection from accept to close.
///
/// Unauthenticated connections never touch the registry. Once registered,
/// the entry is removed on exit only if this handler still owns it.
pub async fn handle(stream: TcpStream, peer: SocketAddr, state: ServerState) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let (sender, writer_handle) = spawn_writer(write_half, DEFAULT_CHANNEL_BUFFER);

    let auth = match await_auth(&mut reader, &sender, peer, &state).await {
        Some(auth) => auth,
        None => {
            drop(sender);
            let _ = writer_handle.await;
            return;
        }
    };

    let generation = state
        .registry
        .register(&auth.client_id, &auth.name, peer, sender.clone());

    if sender.send(Frame::new(Message::AuthOk(AuthOkPayload::now()))).await.is_err() {
        state.registry.remove_if_current(&auth.client_id, generation);
        let _ = writer_handle.await;
        return;
    }

    info!(client_id = %auth.client_id, name = %auth.name, %peer, "agent connected");

    run_active(&mut reader, &auth.client_id, &state).await;

    if state.registry.remove_if_current(&auth.client_id, generation) {
        info!(client_id = %auth.client_id, %peer, "agent disconnected");
    } else {
        debug!(client_id = %auth.client_id, %peer, "superseded session closed");
    }

    drop(sender);
    let _ = writer_handle.await;
}

/// Wait for the first frame and validate it as a well-formed auth.
///
/// On any failure an `error` frame is written best-effort and `None` is
/// returned; the caller closes the connection.
async fn await_auth<R>(
    reader: &mut FrameReader<R>,
    sender: &FrameSender,
    peer: SocketAddr,
    state: &ServerState,
) -> Option<AuthPayload>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let frame = match timeout(state.config.auth_timeout, reader.next()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => {
            debug!(%peer, "connection closed before auth");
            return None;
        }
        Ok(Err(err)) => {
            warn!(%peer, error = %err, "unreadable frame during handshake");
            reject(sender, "malformed auth frame").await;
            return None;
        }
        Err(_) => {
            warn!(%peer, "auth timed out");
            reject(sender, "auth timeout").await;
            return None;
        }
    };

    if frame.version != PROTOCOL_VERSION {
        warn!(%peer, version = %frame.version, "unsupported protocol version");
        reject(sender, "unsupported protocol version").await;
        return None;
    }

    let auth = match frame.message {
        Message::Auth(auth) => auth,
        other => {
            warn!(%peer, kind = other.kind(), "first frame was not auth");
            reject(sender, "expected auth").await;
            return None;
        }
    };

    if auth.token != state.config.auth_token {
        warn!(%peer, client_id = %auth.client_id, "rejected bad token");
        reject(sender, "bad token").await;
        return None;
    }
    if auth.client_id.is_empty() {
        warn!(%peer, "rejected auth with empty client_id");
        reject(sender, "missing client_id").await;
        return None;
    }

    Some(auth)
}

async fn reject(sender: &FrameSender, reason: &str) {
    let frame = Frame::new(Message::Error(ErrorPayload {
        reason: reason.to_string(),
    }));
    // Best-effort: the peer may already be gone.
    let _ = sender.send(frame).await;
}

/// Post-auth loop: every readable frame refreshes liveness, metrics and
/// responses get stored, everything else is ignored.
async fn run_active<R>(reader: &mut FrameReader<R>, client_id: &str, state: &ServerState)
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        match reader.next().await {
            Ok(Some(frame)) => {
                state.registry.touch(client_id);
                dispatch(frame, client_id, state);
            }
            Ok(None) => break,
            Err(err) if err.is_recoverable() => {
                // An unknown-but-parseable frame still proves the agent is
                // alive; a garbled line does not.
                if matches!(err, WireError::UnknownType(_)) {
                    state.registry.touch(client_id);
                }
                warn!(client_id, error = %err, "dropping bad frame");
            }
            Err(err) => {
                warn!(client_id, error = %err, "read failed");
                break;
            }
        }
    }
}

fn dispatch(frame: Frame, client_id: &str, state: &ServerState) {
    match frame.message {
        Message::Heartbeat(_) => {}
        Message::Metrics(metrics) => {
            state.registry.record_metrics(client_id, metrics);
        }
        Message::Response {
            request_id,
            payload,
        } => {
            info!(client_id, request_id = %request_id, "response received");
            state
                .pending
                .record(&request_id, client_id, payload.clone());
            state.observers.notify(ResponseEvent {
                client_id: client_id.to_string(),
                request_id,
                payload,
            });
        }
        other => {
            debug!(client_id, kind = other.kind(), "ignoring unexpected frame");
        }
    }
}

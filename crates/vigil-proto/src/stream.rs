// ABOUTME: Line-framed transport helpers shared by agent and server.
// ABOUTME: Frame reader over a buffered socket and a channel-backed frame writer task.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::WireError;
use crate::message::{decode, encode, Frame};

/// Default buffer size for outbound frame channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Clone-able handle for writing frames to a connection.
///
/// All writes funnel through a single writer task that owns the socket's
/// write half, so concurrent duties never interleave partial lines.
#[derive(Debug, Clone)]
pub struct FrameSender {
    inner: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Queue a frame for writing.
    pub async fn send(&self, frame: Frame) -> Result<(), WireError> {
        self.inner
            .send(frame)
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Queue a frame without waiting for channel capacity.
    pub fn try_send(&self, frame: Frame) -> Result<(), WireError> {
        self.inner.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => WireError::SendQueueFull,
            mpsc::error::TrySendError::Closed(_) => WireError::ConnectionClosed,
        })
    }

    /// True once the writer task has exited.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Spawn the writer task for a connection.
///
/// The task encodes and flushes queued frames until every sender is dropped
/// or a write fails. On write failure it exits, which surfaces to senders as
/// `ConnectionClosed` on their next send.
pub fn spawn_writer<W>(mut writer: W, buffer: usize) -> (FrameSender, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Frame>(buffer);
    let handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let line = match encode(&frame) {
                Ok(line) => line,
                Err(err) => {
                    warn!(kind = frame.message.kind(), %err, "dropping unencodable frame");
                    continue;
                }
            };
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                debug!(%err, "writer task exiting");
                return;
            }
            if let Err(err) = writer.flush().await {
                debug!(%err, "writer task exiting on flush");
                return;
            }
        }
        // All senders dropped: best-effort shutdown of our half.
        let _ = writer.shutdown().await;
    });
    (FrameSender { inner: tx }, handle)
}

/// Buffered frame reader over the read half of a connection.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` at EOF. Decode failures are returned per line —
    /// the offending line has already been consumed, so the caller can log
    /// the error and call `next` again.
    pub async fn next(&mut self) -> Result<Option<Frame>, WireError> {
        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }
            return decode(&self.line).map(Some);
        }
    }
}

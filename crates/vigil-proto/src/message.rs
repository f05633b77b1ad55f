// ABOUTME: Message types and NDJSON codec for the vigil wire protocol.
// ABOUTME: One JSON object per line; a tagged union over the seven message kinds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;
use crate::PROTOCOL_VERSION;

/// Payload of an `auth` message, sent once by the agent as the first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Shared secret, compared by exact match on the server.
    pub token: String,
    /// Stable agent identity. Must be non-empty.
    pub client_id: String,
    /// Human label, not required to be unique.
    pub name: String,
    /// One-shot system descriptor from the sysinfo provider.
    #[serde(default)]
    pub sysinfo: Value,
}

/// Payload of an `auth_ok` reply. Carries the server clock for skew diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthOkPayload {
    /// Server wall clock, seconds since the Unix epoch.
    pub server_time: f64,
}

impl AuthOkPayload {
    /// Reply stamped with the current wall clock.
    pub fn now() -> Self {
        Self {
            server_time: epoch_secs(),
        }
    }
}

/// Payload of an `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub reason: String,
}

/// Payload of a `heartbeat` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Sender wall clock, seconds since the Unix epoch.
    pub t: f64,
}

impl HeartbeatPayload {
    /// Heartbeat stamped with the current wall clock.
    pub fn now() -> Self {
        Self { t: epoch_secs() }
    }
}

/// Seconds since the Unix epoch, as carried in heartbeat and auth_ok frames.
pub fn epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Payload of a `metrics` message. Fields are null when the agent cannot
/// sample them; the server overwrites its copy wholesale on every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

/// Payload of a `request` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Diagnostic to run, e.g. "sysinfo", "processes", "netstat".
    pub req_type: String,
    /// Opaque arguments forwarded to the diagnostics provider.
    #[serde(default)]
    pub data: Value,
}

/// The seven message kinds exchanged between agent and server.
///
/// `request_id` is caller-assigned, opaque, and present only on
/// request/response; the agent echoes it back unchanged so the server can
/// correlate the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Auth(AuthPayload),
    AuthOk(AuthOkPayload),
    Error(ErrorPayload),
    Heartbeat(HeartbeatPayload),
    Metrics(MetricsPayload),
    Request {
        request_id: String,
        payload: RequestPayload,
    },
    Response {
        request_id: String,
        payload: Value,
    },
}

impl Message {
    /// Wire name of this message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Auth(_) => "auth",
            Message::AuthOk(_) => "auth_ok",
            Message::Error(_) => "error",
            Message::Heartbeat(_) => "heartbeat",
            Message::Metrics(_) => "metrics",
            Message::Request { .. } => "request",
            Message::Response { .. } => "response",
        }
    }
}

/// One message plus the protocol version it arrived with.
///
/// Version mismatches are only rejected during handshake; after that,
/// receivers tolerate newer versions for forward-compatible payload growth.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub version: String,
    pub message: Message,
}

impl Frame {
    /// Wrap a message with the current protocol version.
    pub fn new(message: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message,
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Frame::new(message)
    }
}

/// Raw wire layout: `{"v", "type", "request_id"?, "payload"}`.
#[derive(Serialize, Deserialize)]
struct Envelope {
    v: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    payload: Value,
}

/// Encode a frame as one JSON line with a trailing newline.
///
/// JSON string escaping guarantees the delimiter never occurs inside the
/// encoded payload, so every line is exactly one self-contained message.
pub fn encode(frame: &Frame) -> Result<String, WireError> {
    let (request_id, payload) = match &frame.message {
        Message::Auth(p) => (None, serde_json::to_value(p)?),
        Message::AuthOk(p) => (None, serde_json::to_value(p)?),
        Message::Error(p) => (None, serde_json::to_value(p)?),
        Message::Heartbeat(p) => (None, serde_json::to_value(p)?),
        Message::Metrics(p) => (None, serde_json::to_value(p)?),
        Message::Request {
            request_id,
            payload,
        } => (Some(request_id.clone()), serde_json::to_value(payload)?),
        Message::Response {
            request_id,
            payload,
        } => (Some(request_id.clone()), payload.clone()),
    };

    let envelope = Envelope {
        v: frame.version.clone(),
        kind: frame.message.kind().to_string(),
        request_id,
        payload,
    };

    let mut line = serde_json::to_string(&envelope)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line into a frame.
///
/// Fails closed: a structurally required field that is missing (for example
/// `client_id` on `auth`, or `request_id` on request/response) makes the
/// whole line malformed. An unrecognized `type` is reported separately so
/// callers can log and ignore it without treating the line as garbage.
pub fn decode(line: &str) -> Result<Frame, WireError> {
    let envelope: Envelope = serde_json::from_str(line.trim_end())?;

    let message = match envelope.kind.as_str() {
        "auth" => Message::Auth(serde_json::from_value(envelope.payload)?),
        "auth_ok" => Message::AuthOk(serde_json::from_value(envelope.payload)?),
        "error" => Message::Error(serde_json::from_value(envelope.payload)?),
        "heartbeat" => Message::Heartbeat(serde_json::from_value(envelope.payload)?),
        "metrics" => Message::Metrics(serde_json::from_value(envelope.payload)?),
        "request" => Message::Request {
            request_id: envelope
                .request_id
                .ok_or_else(|| WireError::Malformed("request without request_id".to_string()))?,
            payload: serde_json::from_value(envelope.payload)?,
        },
        "response" => Message::Response {
            request_id: envelope
                .request_id
                .ok_or_else(|| WireError::Malformed("response without request_id".to_string()))?,
            payload: envelope.payload,
        },
        other => return Err(WireError::UnknownType(other.to_string())),
    };

    Ok(Frame {
        version: envelope.v,
        message,
    })
}

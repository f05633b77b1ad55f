// ABOUTME: Shared wire protocol definitions for vigil agents and servers.
// ABOUTME: NDJSON framing over TCP, UDP discovery constants, and transport helpers.

pub mod discovery;
pub mod error;
pub mod message;
pub mod stream;

pub use discovery::{is_probe, DiscoveryReply, DISCOVERY_MAGIC};
pub use error::WireError;
pub use message::{
    decode, encode, AuthOkPayload, AuthPayload, ErrorPayload, Frame, HeartbeatPayload, Message,
    MetricsPayload, RequestPayload,
};
pub use stream::{spawn_writer, FrameReader, FrameSender, DEFAULT_CHANNEL_BUFFER};

use base64::Engine;

/// Protocol version carried in the `v` field of every frame.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default TCP port the server accepts agent connections on.
pub const TCP_SERVER_PORT: u16 = 9009;

/// Default UDP port the discovery responder listens on.
pub const UDP_DISCOVERY_PORT: u16 = 9999;

/// Shared-secret token used when none is configured. Demo value only.
pub const DEFAULT_AUTH_TOKEN: &str = "VIGIL-DEMO-TOKEN";

/// Generate a fresh client identity token.
///
/// Eight random bytes, URL-safe base64 without padding. Stable enough to be
/// globally unique for a fleet of agents; generated once per agent process
/// unless an explicit id is configured.
pub fn new_client_id() -> String {
    let bytes: [u8; 8] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

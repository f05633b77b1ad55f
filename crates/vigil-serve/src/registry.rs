// ABOUTME: Shared map of live agent sessions, keyed by client identity.
// ABOUTME: Owned by the server process and injected into every connection handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use vigil_proto::{Frame, FrameSender, Message, MetricsPayload, RequestPayload, WireError};

use crate::error::ServeError;

/// Server-owned state for one connected agent.
///
/// Mutated only by the connection handler that owns the session, so the
/// registry lock is held for map access, never across I/O.
#[derive(Debug)]
struct ClientState {
    name: String,
    addr: SocketAddr,
    sender: FrameSender,
    generation: u64,
    last_seen: Instant,
    last_metrics: MetricsPayload,
}

/// Point-in-time copy of one registry entry, safe to hand out.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub name: String,
    pub addr: SocketAddr,
    /// Time since the last inbound frame of any kind.
    pub age: Duration,
    pub last_metrics: MetricsPayload,
}

/// The live-session map. Cheap to clone; all clones share the same state.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<String, ClientState>>>,
    generations: Arc<AtomicU64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ClientState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a freshly authenticated session, silently replacing any
    /// previous entry with the same id. Returns the generation token the
    /// handler must present at removal time.
    pub fn register(
        &self,
        client_id: &str,
        name: &str,
        addr: SocketAddr,
        sender: FrameSender,
    ) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let state = ClientState {
            name: name.to_string(),
            addr,
            sender,
            generation,
            last_seen: Instant::now(),
            last_metrics: MetricsPayload::default(),
        };
        if self.lock().insert(client_id.to_string(), state).is_some() {
            debug!(client_id, "reconnect superseded an existing session");
        }
        generation
    }

    /// Remove the entry, but only if it still belongs to the connection
    /// presenting this generation. A stale handler closing after a
    /// superseding reconnect must never evict the new session.
    pub fn remove_if_current(&self, client_id: &str, generation: u64) -> bool {
        let mut map = self.lock();
        match map.get(client_id) {
            Some(state) if state.generation == generation => {
                map.remove(client_id);
                true
            }
            _ => false,
        }
    }

    /// Record an inbound frame for liveness accounting.
    pub fn touch(&self, client_id: &str) {
        if let Some(state) = self.lock().get_mut(client_id) {
            state.last_seen = Instant::now();
        }
    }

    /// Overwrite the stored metrics wholesale. No merging.
    pub fn record_metrics(&self, client_id: &str, metrics: MetricsPayload) {
        if let Some(state) = self.lock().get_mut(client_id) {
            state.last_metrics = metrics;
        }
    }

    /// Write a `request` frame to a live client. Fire-and-forget: the reply
    /// arrives later through the observer interface, correlated by
    /// `request_id`.
    pub fn send_request(
        &self,
        client_id: &str,
        req_type: &str,
        request_id: &str,
        data: Value,
    ) -> Result<(), ServeError> {
        let sender = {
            let map = self.lock();
            let state = map
                .get(client_id)
                .ok_or_else(|| ServeError::ClientNotFound(client_id.to_string()))?;
            state.sender.clone()
        };
        let frame = Frame::new(Message::Request {
            request_id: request_id.to_string(),
            payload: RequestPayload {
                req_type: req_type.to_string(),
                data,
            },
        });
        sender.try_send(frame).map_err(|err| match err {
            WireError::SendQueueFull => ServeError::ClientBusy(client_id.to_string()),
            _ => ServeError::ClientGone(client_id.to_string()),
        })
    }

    /// Point-in-time snapshot of every registered client, most recently
    /// heard-from first. Never exposes the live mutable state.
    pub fn snapshot(&self) -> Vec<ClientInfo> {
        let now = Instant::now();
        let mut rows: Vec<ClientInfo> = self
            .lock()
            .iter()
            .map(|(client_id, state)| ClientInfo {
                client_id: client_id.clone(),
                name: state.name.clone(),
                addr: state.addr,
                age: now.saturating_duration_since(state.last_seen),
                last_metrics: state.last_metrics.clone(),
            })
            .collect();
        rows.sort_by_key(|info| info.age);
        rows
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

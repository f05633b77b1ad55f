// ABOUTME: Pending-response store, keyed by request_id.
// ABOUTME: Bounded: the oldest entries are evicted once capacity is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use vigil_proto::message::epoch_secs;

/// One recorded reply, kept for later inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    pub client_id: String,
    pub payload: Value,
    /// Seconds since the Unix epoch at record time.
    pub received_at: f64,
}

struct Inner {
    entries: HashMap<String, PendingResponse>,
    order: VecDeque<String>,
    capacity: usize,
}

/// Responses awaiting inspection, newest-N retained.
#[derive(Clone)]
pub struct PendingResponses {
    inner: Arc<Mutex<Inner>>,
}

impl PendingResponses {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a reply under its request_id, replacing any earlier record
    /// with the same id and evicting the oldest entries beyond capacity.
    pub fn record(&self, request_id: &str, client_id: &str, payload: Value) {
        let mut inner = self.lock();
        if inner.entries.contains_key(request_id) {
            inner.order.retain(|id| id != request_id);
        }
        inner.order.push_back(request_id.to_string());
        inner.entries.insert(
            request_id.to_string(),
            PendingResponse {
                client_id: client_id.to_string(),
                payload,
                received_at: epoch_secs(),
            },
        );
        while inner.entries.len() > inner.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn get(&self, request_id: &str) -> Option<PendingResponse> {
        self.lock().entries.get(request_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_and_get() {
        let pending = PendingResponses::new(16);
        pending.record("r7", "A", json!({"ok": true}));

        let entry = pending.get("r7").unwrap();
        assert_eq!(entry.client_id, "A");
        assert_eq!(entry.payload["ok"], true);
        assert!(entry.received_at > 0.0);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn missing_id_is_none() {
        let pending = PendingResponses::new(16);
        assert!(pending.get("nope").is_none());
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let pending = PendingResponses::new(3);
        for i in 0..5 {
            pending.record(&format!("r{i}"), "A", json!(i));
        }
        assert_eq!(pending.len(), 3);
        assert!(pending.get("r0").is_none());
        assert!(pending.get("r1").is_none());
        assert!(pending.get("r2").is_some());
        assert!(pending.get("r4").is_some());
    }

    #[test]
    fn rerecord_refreshes_position() {
        let pending = PendingResponses::new(2);
        pending.record("r1", "A", json!(1));
        pending.record("r2", "A", json!(2));
        // Re-recording r1 makes it newest; r2 is now the eviction candidate.
        pending.record("r1", "B", json!(10));
        pending.record("r3", "A", json!(3));

        assert_eq!(pending.len(), 2);
        assert!(pending.get("r2").is_none());
        let r1 = pending.get("r1").unwrap();
        assert_eq!(r1.client_id, "B");
        assert_eq!(r1.payload, json!(10));
        assert!(pending.get("r3").is_some());
    }
}

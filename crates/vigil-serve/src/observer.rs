// ABOUTME: Subscription interface for inbound responses.
// ABOUTME: Fan-out to any number of observers; dead subscribers are pruned on notify.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

/// One correlated reply, delivered once per live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEvent {
    pub client_id: String,
    pub request_id: String,
    pub payload: Value,
}

/// Fan-out hub for response events.
///
/// A dashboard, an operator console, and a test harness can all subscribe
/// without the core depending on any of them.
#[derive(Clone, Default)]
pub struct ObserverHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ResponseEvent>>>>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ResponseEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach an observer. Dropping the receiver detaches it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ResponseEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, dropping dead ones.
    pub fn notify(&self, event: ResponseEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(request_id: &str) -> ResponseEvent {
        ResponseEvent {
            client_id: "A".to_string(),
            request_id: request_id.to_string(),
            payload: json!({"ok": true}),
        }
    }

    #[tokio::test]
    async fn delivers_once_per_subscriber() {
        let hub = ObserverHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.notify(event("r7"));

        assert_eq!(first.recv().await.unwrap().request_id, "r7");
        assert_eq!(second.recv().await.unwrap().request_id, "r7");
        // Exactly one delivery each.
        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn prunes_dead_subscribers() {
        let hub = ObserverHub::new();
        let first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        drop(first);
        hub.notify(event("r1"));
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(second.recv().await.unwrap().request_id, "r1");
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_fine() {
        let hub = ObserverHub::new();
        hub.notify(event("r1"));
        assert_eq!(hub.subscriber_count(), 0);
    }
}

// ABOUTME: Exponential reconnect backoff for the agent supervisor.
// ABOUTME: Base 0.5s, doubling, capped at 15s, reset after any session reaches Active.

use std::time::Duration;

/// First reconnect delay after a failure.
pub const RECONNECT_BASE: Duration = Duration::from_millis(500);

/// Upper bound on the reconnect delay.
pub const RECONNECT_MAX: Duration = Duration::from_secs(15);

/// Reconnect delay schedule.
///
/// Each call to `next_delay` returns the current delay and doubles it for
/// the next failure, up to the cap. `reset` is called as soon as a session
/// reaches the Active state so a long-lived connection that later drops
/// retries promptly. No jitter: the schedule is deterministic.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            next: base,
        }
    }

    /// Delay to sleep before the next connection attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    /// Return to the base delay.
    pub fn reset(&mut self) {
        self.next = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RECONNECT_BASE, RECONNECT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_base() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn caps_at_max() {
        let mut backoff = Backoff::default();
        for _ in 0..16 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), RECONNECT_MAX);
        assert_eq!(backoff.next_delay(), RECONNECT_MAX);
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn custom_schedule() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
    }
}

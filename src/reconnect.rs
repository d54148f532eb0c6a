//! Host-side reconnect policy. The transport never retries on its own.

use std::time::{Duration, Instant};

use hydrawarp_engine::ConnectionState;

#[derive(Debug, Clone)]
pub struct Reconnect {
    interval: Option<Duration>,
    next_attempt: Option<Instant>,
}

impl Reconnect {
    /// `None` disables reconnecting.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next_attempt: None,
        }
    }

    pub fn set_interval(&mut self, interval: Option<Duration>) {
        self.interval = interval;
        self.next_attempt = None;
    }

    /// Called once per tick. True when the host should call `connect()` now.
    ///
    /// The first tick that sees the link down schedules an attempt one interval later. An
    /// attempt still in flight (`pending`) counts as up, however long its handshake takes.
    pub fn due(&mut self, state: ConnectionState, pending: bool, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        if pending {
            self.next_attempt = None;
            return false;
        }

        match state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.next_attempt = None;
                false
            }
            ConnectionState::Disconnected | ConnectionState::Interrupted | ConnectionState::Failed => {
                match self.next_attempt {
                    None => {
                        self.next_attempt = Some(now + interval);
                        false
                    }
                    Some(at) if now >= at => {
                        self.next_attempt = None;
                        true
                    }
                    Some(_) => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn waits_one_interval_after_going_down() {
        let t0 = Instant::now();
        let mut r = Reconnect::new(Some(SEC));
        assert!(!r.due(ConnectionState::Disconnected, false, t0));
        assert!(!r.due(ConnectionState::Disconnected, false, t0 + SEC / 2));
        assert!(r.due(ConnectionState::Disconnected, false, t0 + SEC));
        // Next attempt is a full interval away again.
        assert!(!r.due(ConnectionState::Failed, false, t0 + SEC));
        assert!(r.due(ConnectionState::Failed, false, t0 + SEC * 2));
    }

    #[test]
    fn connecting_or_connected_resets_the_timer() {
        let t0 = Instant::now();
        let mut r = Reconnect::new(Some(SEC));
        assert!(!r.due(ConnectionState::Interrupted, false, t0));
        assert!(!r.due(ConnectionState::Connecting, false, t0 + SEC));
        assert!(!r.due(ConnectionState::Disconnected, false, t0 + SEC));
        assert!(r.due(ConnectionState::Disconnected, false, t0 + SEC * 2));
    }

    #[test]
    fn pending_reconnect_after_interruption_is_left_alone() {
        let t0 = Instant::now();
        let mut r = Reconnect::new(Some(SEC));
        assert!(!r.due(ConnectionState::Interrupted, false, t0));
        assert!(r.due(ConnectionState::Interrupted, false, t0 + SEC));
        // The handshake is slower than the interval.
        assert!(!r.due(ConnectionState::Interrupted, true, t0 + SEC * 2));
        assert!(!r.due(ConnectionState::Interrupted, true, t0 + SEC * 5));
        // It failed: wait a full interval again.
        assert!(!r.due(ConnectionState::Disconnected, false, t0 + SEC * 6));
        assert!(r.due(ConnectionState::Disconnected, false, t0 + SEC * 7));
    }

    #[test]
    fn disabled_never_fires() {
        let t0 = Instant::now();
        let mut r = Reconnect::new(None);
        assert!(!r.due(ConnectionState::Disconnected, false, t0));
        assert!(!r.due(ConnectionState::Disconnected, false, t0 + SEC * 10));
    }
}

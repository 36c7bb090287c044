//! Connection phase and the transitions the adapter applies to it.

use std::time::Duration;

use crate::error::TransportError;

/// Lifecycle phase of the single backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// First connection attempt in progress
    Connecting,
    Open,
    /// Not connected; see `retry_scheduled` for whether another attempt follows
    Closed,
    /// Waiting out backoff or retrying after a drop
    Reconnecting,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Open => "open",
            ConnectionPhase::Closed => "closed",
            ConnectionPhase::Reconnecting => "reconnecting",
        }
    }
}

/// Observable connection state published by every transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    /// Attempts since the last successful open; reset to 0 on open
    pub reconnect_attempt_count: u32,
    pub last_error: Option<TransportError>,
    /// Whether another connection attempt will be made without user action
    pub retry_scheduled: bool,
    /// Delay before the scheduled attempt, while one is pending
    pub next_retry_in: Option<Duration>,
    /// Incremented on every successful open. A change means the server side
    /// may have moved on without us and the active thread needs a resync.
    pub open_epoch: u64,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            reconnect_attempt_count: 0,
            last_error: None,
            retry_scheduled: false,
            next_retry_in: None,
            open_epoch: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }

    /// True while the connection is down but recovery is underway.
    pub fn is_recovering(&self) -> bool {
        match self.phase {
            ConnectionPhase::Reconnecting => true,
            ConnectionPhase::Closed => self.retry_scheduled,
            _ => false,
        }
    }

    pub fn mark_open(&mut self) {
        self.phase = ConnectionPhase::Open;
        self.reconnect_attempt_count = 0;
        self.last_error = None;
        self.retry_scheduled = false;
        self.next_retry_in = None;
        self.open_epoch += 1;
    }

    /// Record a failed attempt or a dropped connection.
    pub fn mark_closed(&mut self, error: TransportError, retry_in: Option<Duration>) {
        self.phase = ConnectionPhase::Closed;
        self.retry_scheduled = retry_in.is_some();
        self.next_retry_in = retry_in;
        self.last_error = Some(error);
    }

    /// Enter backoff before the next attempt.
    pub fn begin_reconnect(&mut self, delay: Duration) {
        self.phase = ConnectionPhase::Reconnecting;
        self.reconnect_attempt_count += 1;
        self.retry_scheduled = true;
        self.next_retry_in = Some(delay);
    }

    /// Stop retrying; the connection stays closed.
    pub fn give_up(&mut self, error: TransportError) {
        self.phase = ConnectionPhase::Closed;
        self.retry_scheduled = false;
        self.next_retry_in = None;
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dropped() -> TransportError {
        TransportError::Disconnected {
            reason: "reset".to_string(),
        }
    }

    #[test]
    fn test_initial_state_is_connecting() {
        let state = ConnectionState::new();
        assert_eq!(state.phase, ConnectionPhase::Connecting);
        assert_eq!(state.reconnect_attempt_count, 0);
        assert_eq!(state.open_epoch, 0);
        assert!(!state.is_recovering());
    }

    #[test]
    fn test_reconnect_attempts_increment_and_reset() {
        let mut state = ConnectionState::new();
        state.mark_open();
        assert_eq!(state.open_epoch, 1);

        state.mark_closed(dropped(), Some(Duration::from_secs(1)));
        assert!(state.is_recovering());
        state.begin_reconnect(Duration::from_secs(1));
        state.mark_closed(dropped(), Some(Duration::from_secs(2)));
        state.begin_reconnect(Duration::from_secs(2));
        assert_eq!(state.phase, ConnectionPhase::Reconnecting);
        assert_eq!(state.reconnect_attempt_count, 2);
        assert!(state.last_error.is_some());

        state.mark_open();
        assert_eq!(state.reconnect_attempt_count, 0);
        assert!(state.last_error.is_none());
        assert_eq!(state.open_epoch, 2);
    }

    #[test]
    fn test_give_up_is_not_recovering() {
        let mut state = ConnectionState::new();
        state.give_up(TransportError::RetriesExhausted { attempts: 3 });
        assert_eq!(state.phase, ConnectionPhase::Closed);
        assert!(!state.retry_scheduled);
        assert!(!state.is_recovering());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(ConnectionPhase::Open.as_str(), "open");
        assert_eq!(ConnectionPhase::Reconnecting.as_str(), "reconnecting");
    }
}

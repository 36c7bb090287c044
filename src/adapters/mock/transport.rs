//! Mock transport for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};

use crate::connection::{ConnectionState, OutboundQueue};
use crate::error::TransportError;
use crate::models::{ClientEnvelope, ServerEnvelope};
use crate::traits::Transport;

/// Mock transport for testing.
///
/// Mirrors the real adapter's contract: envelopes sent while the mock is not
/// open are queued and only show up in [`sent_envelopes`](Self::sent_envelopes)
/// after [`simulate_open`](Self::simulate_open).
///
/// # Example
///
/// ```ignore
/// use agentsync::adapters::mock::MockTransport;
///
/// let mock = MockTransport::new();
/// mock.inject_frame(r#"{"type": "agent_started", "payload": {...}}"#);
///
/// mock.send(ClientEnvelope::user_message("hi", "t-1", None)).await?;
/// assert_eq!(mock.sent_envelopes().await.len(), 1);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    incoming_tx: broadcast::Sender<String>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    sent: Arc<Mutex<Vec<ClientEnvelope>>>,
    queue: Arc<Mutex<OutboundQueue>>,
    send_should_fail: Arc<Mutex<bool>>,
}

impl MockTransport {
    /// Create a mock that is already open.
    pub fn new() -> Self {
        let mut state = ConnectionState::new();
        state.mark_open();
        Self::with_state(state)
    }

    /// Create a mock still in its first connecting phase.
    pub fn connecting() -> Self {
        Self::with_state(ConnectionState::new())
    }

    fn with_state(state: ConnectionState) -> Self {
        let (incoming_tx, _) = broadcast::channel(256);
        let (state_tx, state_rx) = watch::channel(state);

        Self {
            incoming_tx,
            state_tx: Arc::new(state_tx),
            state_rx,
            sent: Arc::new(Mutex::new(Vec::new())),
            queue: Arc::new(Mutex::new(OutboundQueue::new(1024))),
            send_should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Deliver a raw text frame to all subscribers.
    pub fn inject_frame(&self, frame: impl Into<String>) {
        // Ignore send errors (no subscribers)
        let _ = self.incoming_tx.send(frame.into());
    }

    /// Serialize and deliver an envelope.
    pub fn inject_envelope(&self, envelope: &ServerEnvelope) {
        if let Ok(json) = serde_json::to_string(envelope) {
            self.inject_frame(json);
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Open the connection and flush queued envelopes in order.
    pub async fn simulate_open(&self) {
        let mut queue = self.queue.lock().await;
        self.state_tx.send_modify(|s| s.mark_open());
        let mut sent = self.sent.lock().await;
        while let Some(envelope) = queue.pop_front() {
            sent.push(envelope);
        }
    }

    /// Drop the connection with a retry scheduled.
    pub fn simulate_drop(&self, reason: &str) {
        let error = TransportError::Disconnected {
            reason: reason.to_string(),
        };
        self.state_tx
            .send_modify(|s| s.mark_closed(error, Some(Duration::from_secs(1))));
    }

    pub fn simulate_reconnecting(&self, delay: Duration) {
        self.state_tx.send_modify(|s| s.begin_reconnect(delay));
    }

    /// Close the connection for good.
    pub fn simulate_give_up(&self, attempts: u32) {
        self.state_tx
            .send_modify(|s| s.give_up(TransportError::RetriesExhausted { attempts }));
    }

    /// Envelopes that reached the (simulated) wire.
    pub async fn sent_envelopes(&self) -> Vec<ClientEnvelope> {
        self.sent.lock().await.clone()
    }

    pub async fn queued_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn set_send_should_fail(&self, should_fail: bool) {
        *self.send_should_fail.lock().await = should_fail;
    }

    pub fn subscriber_count(&self) -> usize {
        self.incoming_tx.receiver_count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, envelope: ClientEnvelope) -> Result<(), TransportError> {
        if *self.send_should_fail.lock().await {
            return Err(TransportError::SendFailed("Mock send failure".to_string()));
        }

        let mut queue = self.queue.lock().await;
        if self.state_rx.borrow().is_open() {
            self.sent.lock().await.push(envelope);
        } else {
            queue.push(envelope);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.incoming_tx.subscribe()
    }

    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn shutdown(&self) {
        self.state_tx
            .send_modify(|s| s.give_up(TransportError::Shutdown));
    }
}

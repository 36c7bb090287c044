use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::outbound::OutboundQueue;
use super::state::ConnectionState;
use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::models::ClientEnvelope;
use crate::traits::Transport;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Capacity of the inbound frame broadcast channel
const INCOMING_CAPACITY: usize = 1024;

/// Settings for the connection loop, derived from [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub max_retries: Option<u32>,
    pub backoff: Backoff,
    pub outbound_queue_limit: usize,
}

impl From<&SyncConfig> for ConnectionConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            max_retries: config.max_retries,
            backoff: Backoff::new(config.initial_backoff, config.max_backoff),
            outbound_queue_limit: config.outbound_queue_limit,
        }
    }
}

/// Owns the single WebSocket connection to the agent backend.
///
/// A background task connects, reconnects with exponential backoff and
/// flushes queued outbound envelopes once the socket opens. Inbound text
/// frames are fanned out raw; parsing belongs to the router.
pub struct ConnectionAdapter {
    outbound_tx: mpsc::UnboundedSender<ClientEnvelope>,
    incoming_tx: broadcast::Sender<String>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
}

impl ConnectionAdapter {
    /// Start connecting in the background. Must be called inside a tokio runtime.
    ///
    /// Never fails: an unreachable server shows up as a closed or
    /// reconnecting phase on [`Transport::state`].
    pub fn connect(config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (incoming_tx, _) = broadcast::channel(INCOMING_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_incoming = incoming_tx.clone();
        tokio::spawn(async move {
            run_connection_loop(config, loop_incoming, outbound_rx, state_tx, shutdown_rx).await;
        });

        Self {
            outbound_tx,
            incoming_tx,
            state_rx,
            shutdown_tx,
        }
    }
}

#[async_trait]
impl Transport for ConnectionAdapter {
    async fn send(&self, envelope: ClientEnvelope) -> Result<(), TransportError> {
        self.outbound_tx
            .send(envelope)
            .map_err(|_| TransportError::Shutdown)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.incoming_tx.subscribe()
    }

    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn shutdown(&self) {
        info!("Shutting down connection adapter");
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ConnectionAdapter {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    Dropped(TransportError),
}

/// Connect, serve, and reconnect until shutdown or retries run out.
async fn run_connection_loop(
    config: ConnectionConfig,
    incoming_tx: broadcast::Sender<String>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientEnvelope>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut queue = OutboundQueue::new(config.outbound_queue_limit);

    'connection: loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let attempt = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            _ = shutdown_rx.changed() => break 'connection,
        };

        let failure = match attempt {
            Ok((ws_stream, _)) => {
                state_tx.send_modify(|s| s.mark_open());
                info!(url = %config.url, "Connected to agent backend");

                let (sink, source) = ws_stream.split();
                match run_session(
                    sink,
                    source,
                    &mut queue,
                    &mut outbound_rx,
                    &incoming_tx,
                    &mut shutdown_rx,
                )
                .await
                {
                    SessionEnd::Shutdown => break 'connection,
                    SessionEnd::Dropped(err) => err,
                }
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "Connection attempt failed");
                TransportError::ConnectionFailed {
                    url: config.url.clone(),
                    message: e.to_string(),
                }
            }
        };

        let next_attempt = state_tx.borrow().reconnect_attempt_count + 1;
        if let Some(max) = config.max_retries {
            if next_attempt > max {
                error!(attempts = max, "Failed to reconnect, giving up");
                state_tx.send_modify(|s| s.give_up(TransportError::RetriesExhausted { attempts: max }));
                return;
            }
        }

        let delay = config.backoff.delay_for(next_attempt);
        state_tx.send_modify(|s| s.mark_closed(failure, Some(delay)));
        state_tx.send_modify(|s| s.begin_reconnect(delay));
        info!(
            attempt = next_attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after backoff"
        );

        if !wait_backoff(delay, &mut queue, &mut outbound_rx, &mut shutdown_rx).await {
            break;
        }
    }

    debug!("Connection loop ended");
    state_tx.send_modify(|s| {
        s.give_up(TransportError::Shutdown);
    });
}

/// Sleep out the backoff while still accepting outbound envelopes.
///
/// Returns false if shutdown was requested.
async fn wait_backoff(
    delay: Duration,
    queue: &mut OutboundQueue,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientEnvelope>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            _ = shutdown_rx.changed() => return false,
            envelope = outbound_rx.recv() => match envelope {
                Some(envelope) => {
                    queue.push(envelope);
                }
                None => return false,
            },
        }
    }
}

/// Serve one open socket: flush the queue, then pump frames both ways.
async fn run_session(
    mut sink: WsSink,
    mut source: WsSource,
    queue: &mut OutboundQueue,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientEnvelope>,
    incoming_tx: &broadcast::Sender<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    // Anything that arrived before open goes out first, in order.
    while let Ok(envelope) = outbound_rx.try_recv() {
        queue.push(envelope);
    }
    if !queue.is_empty() {
        debug!(queued = queue.len(), "Flushing outbound queue");
    }
    while let Some(envelope) = queue.pop_front() {
        if let Err(err) = write_envelope(&mut sink, &envelope).await {
            queue.requeue_front(envelope);
            return SessionEnd::Dropped(err);
        }
    }

    loop {
        tokio::select! {
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // No subscribers is fine; frames are not replayed.
                        let _ = incoming_tx.send(text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Received close frame from server");
                        return SessionEnd::Dropped(TransportError::Disconnected {
                            reason: "closed by server".to_string(),
                        });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return SessionEnd::Dropped(TransportError::Disconnected {
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        info!("WebSocket stream ended");
                        return SessionEnd::Dropped(TransportError::Disconnected {
                            reason: "stream ended".to_string(),
                        });
                    }
                }
            }
            envelope = outbound_rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        if let Err(err) = write_envelope(&mut sink, &envelope).await {
                            queue.requeue_front(envelope);
                            return SessionEnd::Dropped(err);
                        }
                    }
                    None => {
                        debug!("Outbound channel closed, shutting down");
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                debug!("Shutdown signal received, closing connection");
                let _ = sink.close().await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

async fn write_envelope(sink: &mut WsSink, envelope: &ClientEnvelope) -> Result<(), TransportError> {
    let json = serde_json::to_string(envelope)
        .map_err(|e| TransportError::SendFailed(format!("serialize: {}", e)))?;
    debug!(thread_id = %envelope.thread_id(), "Sending envelope");
    sink.send(Message::Text(json)).await.map_err(|e| {
        error!(error = %e, "Failed to send envelope");
        TransportError::SendFailed(e.to_string())
    })
}

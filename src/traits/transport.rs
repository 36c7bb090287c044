//! Backend transport trait abstraction.

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::models::ClientEnvelope;

/// Trait for the connection to the agent backend.
///
/// Implementations queue envelopes sent while the connection is not open
/// and flush them in order once it opens. Inbound frames are delivered raw
/// so that malformed input is counted by the router rather than dropped
/// silently here.
///
/// # Example
///
/// ```ignore
/// use agentsync::traits::Transport;
///
/// async fn pump<T: Transport>(transport: &T) {
///     let mut frames = transport.subscribe();
///     while let Ok(frame) = frames.recv().await {
///         println!("{}", frame);
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an envelope, or queue it until the connection opens.
    ///
    /// Only fails once the transport has shut down.
    async fn send(&self, envelope: ClientEnvelope) -> Result<(), TransportError>;

    /// Subscribe to inbound text frames.
    ///
    /// Multiple subscribers can exist simultaneously; each gets every frame
    /// received after it subscribed.
    fn subscribe(&self) -> broadcast::Receiver<String>;

    /// Get a receiver for connection state changes.
    fn state(&self) -> watch::Receiver<ConnectionState>;

    /// Close the connection and stop reconnecting.
    fn shutdown(&self);
}

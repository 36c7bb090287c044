//! Transport-level error types.

use thiserror::Error;

/// Errors produced by the connection adapter and its transports.
///
/// These are surfaced as connection state, never thrown across component
/// boundaries; the variants exist so `last_error` and logs can say why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connecting to the server failed.
    #[error("Connection failed to {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// The live connection was dropped.
    #[error("Disconnected from server: {reason}")]
    Disconnected { reason: String },

    /// A frame could not be written to the socket.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The adapter has been shut down and accepts no more envelopes.
    #[error("Connection adapter is shut down")]
    Shutdown,

    /// Reconnect attempts were exhausted.
    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl TransportError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "TRANSPORT_CONNECT_FAILED",
            TransportError::Disconnected { .. } => "TRANSPORT_DISCONNECTED",
            TransportError::SendFailed(_) => "TRANSPORT_SEND_FAILED",
            TransportError::Shutdown => "TRANSPORT_SHUTDOWN",
            TransportError::RetriesExhausted { .. } => "TRANSPORT_RETRIES_EXHAUSTED",
        }
    }

    /// Whether the reconnect loop can still recover from this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::Shutdown | TransportError::RetriesExhausted { .. }
        )
    }
}

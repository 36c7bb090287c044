//! Errors for the optimistic send pipeline.

use thiserror::Error;

use crate::models::MessageStatus;

/// Errors surfaced synchronously by `send_message` and `retry`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// Message content is empty after trimming.
    #[error("Cannot send an empty message")]
    EmptyContent,

    /// No thread is active, so there is nowhere to send.
    #[error("No active thread")]
    NoActiveThread,

    /// A thread switch is in flight; the active thread is about to change.
    #[error("Cannot send while switching to thread {thread_id}")]
    SwitchInProgress { thread_id: String },

    /// No optimistic message with this client id exists in the timeline.
    #[error("Unknown message: {client_id}")]
    UnknownMessage { client_id: String },

    /// Only failed messages can be retried.
    #[error("Message {client_id} is {status:?} and cannot be retried")]
    InvalidRetry {
        client_id: String,
        status: MessageStatus,
    },

    /// A pending message was not confirmed inside the send timeout.
    #[error("Message {client_id} was not confirmed within {timeout_ms}ms")]
    SendTimeout { client_id: String, timeout_ms: u64 },
}

impl TimelineError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TimelineError::EmptyContent => "TIMELINE_EMPTY_CONTENT",
            TimelineError::NoActiveThread => "TIMELINE_NO_ACTIVE_THREAD",
            TimelineError::SwitchInProgress { .. } => "TIMELINE_SWITCH_IN_PROGRESS",
            TimelineError::UnknownMessage { .. } => "TIMELINE_UNKNOWN_MESSAGE",
            TimelineError::InvalidRetry { .. } => "TIMELINE_INVALID_RETRY",
            TimelineError::SendTimeout { .. } => "TIMELINE_SEND_TIMEOUT",
        }
    }
}

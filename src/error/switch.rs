//! Thread switch and thread fetch error types.

use thiserror::Error;

/// Why a thread switch ended in `FAILED`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    /// The requested id is not a well-formed thread id.
    #[error("Invalid thread id {thread_id:?}: {reason}")]
    InvalidThreadId { thread_id: String, reason: String },

    /// Loading the thread's initial page failed.
    #[error("Failed to load thread {thread_id}: {source}")]
    Fetch {
        thread_id: String,
        #[source]
        source: FetchError,
    },
}

/// Errors from the thread fetch service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The thread does not exist on the server.
    #[error("Thread not found: {thread_id}")]
    NotFound { thread_id: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not a message page.
    #[error("Failed to decode messages: {0}")]
    Decode(String),
}

impl SwitchError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SwitchError::InvalidThreadId { .. } => "SWITCH_INVALID_THREAD_ID",
            SwitchError::Fetch { source, .. } => source.error_code(),
        }
    }
}

impl FetchError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::NotFound { .. } => "FETCH_NOT_FOUND",
            FetchError::Http { .. } => "FETCH_HTTP_STATUS",
            FetchError::Network(_) => "FETCH_NETWORK",
            FetchError::Decode(_) => "FETCH_DECODE",
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::NotFound { .. } | FetchError::Decode(_) => false,
        }
    }
}

//! Unified error type for the synchronization engine.

use thiserror::Error;

use super::agent::AgentError;
use super::auth::AuthError;
use super::category::ErrorCategory;
use super::config::ConfigError;
use super::protocol::ProtocolError;
use super::switch::{FetchError, SwitchError};
use super::timeline::TimelineError;
use super::transport::TransportError;

/// Unified error type.
///
/// `SyncError` consolidates the domain errors so callers get one type with
/// consistent categorization, retry logic and user messaging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Transport(_) => ErrorCategory::Network,
            SyncError::Protocol(_) => ErrorCategory::Protocol,
            SyncError::Auth(_) => ErrorCategory::Auth,
            SyncError::Agent(_) => ErrorCategory::Agent,
            SyncError::Timeline(TimelineError::SendTimeout { .. }) => ErrorCategory::Network,
            SyncError::Timeline(_) => ErrorCategory::User,
            SyncError::Switch(SwitchError::InvalidThreadId { .. }) => ErrorCategory::User,
            SyncError::Switch(SwitchError::Fetch { source, .. }) => fetch_category(source),
            SyncError::Fetch(err) => fetch_category(err),
            SyncError::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(err) => err.is_retryable(),
            SyncError::Agent(err) => err.is_recoverable,
            SyncError::Timeline(TimelineError::SendTimeout { .. }) => true,
            SyncError::Switch(SwitchError::Fetch { source, .. }) => source.is_retryable(),
            SyncError::Fetch(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Transport(err) => err.error_code(),
            SyncError::Protocol(err) => err.error_code(),
            SyncError::Auth(err) => err.error_code(),
            SyncError::Agent(_) => "AGENT_ERROR",
            SyncError::Timeline(err) => err.error_code(),
            SyncError::Switch(err) => err.error_code(),
            SyncError::Fetch(err) => err.error_code(),
            SyncError::Config(_) => "CONFIG_INVALID",
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Auth(_) => "You need to sign in before sending messages.".to_string(),
            SyncError::Timeline(TimelineError::SendTimeout { .. }) => {
                "Your message was not delivered. Tap retry to send it again.".to_string()
            }
            SyncError::Agent(err) if err.is_recoverable => {
                format!("The agent hit a problem and is retrying: {}", err.message)
            }
            SyncError::Agent(err) => format!("The agent stopped: {}", err.message),
            other => format!("{}. {}", other, self.category().recovery_hint()),
        }
    }
}

fn fetch_category(err: &FetchError) -> ErrorCategory {
    match err {
        FetchError::NotFound { .. } => ErrorCategory::User,
        FetchError::Decode(_) => ErrorCategory::Protocol,
        FetchError::Http { .. } | FetchError::Network(_) => ErrorCategory::Network,
    }
}

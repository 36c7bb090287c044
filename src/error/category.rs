//! Error category classification for unified error handling.
//!
//! Categories drive retry policy and the wording the UI shows next to a
//! failure, independent of which component produced it.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport-level failures (connect, drop, send).
    /// Recovered automatically by the reconnect loop.
    Network,

    /// Malformed or unroutable envelopes.
    /// Dropped and counted; never retried.
    Protocol,

    /// Operation attempted without an authenticated identity.
    Auth,

    /// Failure reported by the agent backend for a run.
    Agent,

    /// User action required (empty input, invalid thread id, retry a message).
    User,

    /// Configuration errors (bad env values, unusable URLs).
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Agent)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Agent => "agent",
            ErrorCategory::User => "user",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Reconnecting automatically; your messages are queued",
            ErrorCategory::Protocol => "The server sent data this client does not understand",
            ErrorCategory::Auth => "Sign in to send messages",
            ErrorCategory::Agent => "The agent hit a problem; you can re-send your message",
            ErrorCategory::User => "Please check your input and try again",
            ErrorCategory::Configuration => "Check your configuration settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Agent.is_retryable());
        assert!(!ErrorCategory::Protocol.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::User.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
        assert_eq!(format!("{}", ErrorCategory::Protocol), "protocol");
    }

    #[test]
    fn test_recovery_hints_non_empty() {
        for cat in [
            ErrorCategory::Network,
            ErrorCategory::Protocol,
            ErrorCategory::Auth,
            ErrorCategory::Agent,
            ErrorCategory::User,
            ErrorCategory::Configuration,
        ] {
            assert!(!cat.recovery_hint().is_empty());
        }
    }
}

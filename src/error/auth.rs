//! Authentication-related error types.

use thiserror::Error;

/// Errors raised when a user action needs an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No authenticated identity is available.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Authenticated flag is set but the provider has no user id.
    #[error("Authenticated session has no user id")]
    MissingUserId,
}

impl AuthError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "AUTH_NOT_AUTHENTICATED",
            AuthError::MissingUserId => "AUTH_MISSING_USER_ID",
        }
    }
}

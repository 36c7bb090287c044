//! Configuration error types.

use thiserror::Error;

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("Invalid value {value:?} for {var}: {message}")]
    InvalidValue {
        var: String,
        value: String,
        message: String,
    },

    /// A URL setting uses a scheme the component cannot speak.
    #[error("Unsupported URL {url:?} for {setting}")]
    UnsupportedUrl { setting: String, url: String },
}

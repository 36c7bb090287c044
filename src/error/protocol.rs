//! Protocol error types for inbound envelopes.

use thiserror::Error;

/// A frame that could not be turned into a routable envelope, or an
/// envelope a handler refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    #[error("Invalid JSON frame: {message}")]
    InvalidJson { message: String },

    /// Frame has no string `type` field.
    #[error("Envelope has no type field")]
    MissingKind,

    /// `type` names a kind this client does not know.
    #[error("Unknown envelope kind: {kind}")]
    UnknownKind { kind: String },

    /// Payload does not match the declared kind.
    #[error("Malformed {kind} payload: {message}")]
    MalformedPayload { kind: String, message: String },

    /// A handler rejected an otherwise well-formed envelope.
    #[error("Cannot apply {kind}: {reason}")]
    Unroutable { kind: String, reason: String },
}

impl ProtocolError {
    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::InvalidJson { .. } => "PROTOCOL_INVALID_JSON",
            ProtocolError::MissingKind => "PROTOCOL_MISSING_KIND",
            ProtocolError::UnknownKind { .. } => "PROTOCOL_UNKNOWN_KIND",
            ProtocolError::MalformedPayload { .. } => "PROTOCOL_MALFORMED_PAYLOAD",
            ProtocolError::Unroutable { .. } => "PROTOCOL_UNROUTABLE",
        }
    }
}

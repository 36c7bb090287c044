//! Agent-reported failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure the backend reported for a run via `agent_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Agent error ({kind}): {message}")]
pub struct AgentError {
    pub kind: String,
    pub message: String,
    pub is_recoverable: bool,
}

impl AgentError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, is_recoverable: bool) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            is_recoverable,
        }
    }
}

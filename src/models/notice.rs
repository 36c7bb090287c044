use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a notice should be presented
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    /// Recoverable; the run or send is still going
    Transient,
    Error,
}

/// Inline, dismissible notice attached to a thread session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    /// Unique identifier for this notice (for dismiss tracking)
    pub id: String,
    pub severity: NoticeSeverity,
    /// Error code (e.g., "rate_limit", "AUTH_NOT_AUTHENTICATED")
    pub error_code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    /// Create a new notice with a generated ID
    pub fn new(severity: NoticeSeverity, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            severity,
            error_code: error_code.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// Delivery status of a message.
///
/// Server-originated messages are always `Confirmed`; only optimistic user
/// messages pass through `Pending` and possibly `Failed`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    #[default]
    Confirmed,
    Failed,
}

/// A message in a thread timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Server id once confirmed, client id while optimistic
    pub id: String,
    /// ID of the thread this message belongs to
    pub thread_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Hidden messages stay in the timeline for ordering but are not rendered
    #[serde(default = "default_displayed")]
    pub displayed_to_user: bool,
    #[serde(default)]
    pub status: MessageStatus,
    /// Client-generated id this message was sent under, kept after confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Why delivery failed, for the retry affordance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

fn default_displayed() -> bool {
    true
}

impl Message {
    /// Create an optimistic user message under a fresh client id.
    pub fn optimistic(thread_id: &str, content: String) -> Self {
        let client_id = format!("client-{}", uuid::Uuid::new_v4());
        Self {
            id: client_id.clone(),
            thread_id: thread_id.to_string(),
            role: MessageRole::User,
            content,
            created_at: Utc::now(),
            displayed_to_user: true,
            status: MessageStatus::Pending,
            client_id: Some(client_id),
            failure_reason: None,
            metadata: None,
        }
    }

    /// Create a confirmed server-side message.
    pub fn server(
        id: impl Into<String>,
        thread_id: &str,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            displayed_to_user: true,
            status: MessageStatus::Confirmed,
            client_id: None,
            failure_reason: None,
            metadata: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == MessageStatus::Failed
    }

    /// Whether this message still carries the id it was created with on the client.
    pub fn is_optimistic(&self) -> bool {
        self.client_id.as_deref() == Some(self.id.as_str())
    }
}

/// Message shape as delivered by the server, both in `message_created`
/// envelopes and in fetched message pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_displayed")]
    pub displayed_to_user: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl WireMessage {
    /// Convert to a confirmed timeline message for `thread_id`.
    pub fn into_message(self, thread_id: &str) -> Message {
        Message {
            id: self.id,
            thread_id: thread_id.to_string(),
            role: self.role,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            displayed_to_user: self.displayed_to_user,
            status: MessageStatus::Confirmed,
            client_id: None,
            failure_reason: None,
            metadata: self.metadata,
        }
    }
}

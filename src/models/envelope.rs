//! Wire envelopes exchanged with the agent backend.
//!
//! Every envelope is adjacently tagged: `{"type": <kind>, "payload": {...}}`.
//! Inbound frames are validated into [`ServerEnvelope`] before any handler
//! sees them; a frame that does not fit is a [`ProtocolError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::WireMessage;
use crate::error::ProtocolError;

/// Envelopes received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEnvelope {
    AgentStarted(AgentStarted),
    SubAgentUpdate(SubAgentUpdate),
    AgentThinking(AgentThinking),
    PartialResult(PartialResult),
    ToolExecuting(ToolExecuting),
    OptimizationComplete(OptimizationComplete),
    AgentCompleted(AgentCompleted),
    AgentError(AgentErrorPayload),
    MessageCreated(MessageCreated),
}

/// Discriminant of a [`ServerEnvelope`], used for routing, dedup keys and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    AgentStarted,
    SubAgentUpdate,
    AgentThinking,
    PartialResult,
    ToolExecuting,
    OptimizationComplete,
    AgentCompleted,
    AgentError,
    MessageCreated,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 9] = [
        EnvelopeKind::AgentStarted,
        EnvelopeKind::SubAgentUpdate,
        EnvelopeKind::AgentThinking,
        EnvelopeKind::PartialResult,
        EnvelopeKind::ToolExecuting,
        EnvelopeKind::OptimizationComplete,
        EnvelopeKind::AgentCompleted,
        EnvelopeKind::AgentError,
        EnvelopeKind::MessageCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::AgentStarted => "agent_started",
            EnvelopeKind::SubAgentUpdate => "sub_agent_update",
            EnvelopeKind::AgentThinking => "agent_thinking",
            EnvelopeKind::PartialResult => "partial_result",
            EnvelopeKind::ToolExecuting => "tool_executing",
            EnvelopeKind::OptimizationComplete => "optimization_complete",
            EnvelopeKind::AgentCompleted => "agent_completed",
            EnvelopeKind::AgentError => "agent_error",
            EnvelopeKind::MessageCreated => "message_created",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported by a sub-agent update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAgentStatus {
    Running,
    Completed,
    Retrying,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStarted {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentUpdate {
    pub thread_id: String,
    pub run_id: String,
    pub sub_agent_name: String,
    pub status: SubAgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fraction complete in `0.0..=1.0` when the agent reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub active_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThinking {
    pub thread_id: String,
    pub run_id: String,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub thread_id: String,
    pub run_id: String,
    pub content: String,
    #[serde(default)]
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecuting {
    pub thread_id: String,
    pub run_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationComplete {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default)]
    pub analysis: serde_json::Value,
    #[serde(default)]
    pub recommendations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCompleted {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default)]
    pub final_report: serde_json::Value,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub completed_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    /// Id of the assistant message carrying the report, when the server assigns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl AgentCompleted {
    /// Render the final report as display text.
    ///
    /// A string report is used as-is, an object contributes its `summary`
    /// or `content` field, anything else is pretty-printed JSON.
    pub fn report_text(&self) -> String {
        match &self.final_report {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => ["summary", "content"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| pretty_json(&self.final_report)),
            other => pretty_json(other),
        }
    }
}

fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorPayload {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub is_recoverable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreated {
    pub thread_id: String,
    pub message: WireMessage,
    /// Echo of the `client_message_id` sent with the matching `user_message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl ServerEnvelope {
    /// Validate a raw text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson {
                message: e.to_string(),
            })?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingKind)?;

        if EnvelopeKind::parse(kind).is_none() {
            return Err(ProtocolError::UnknownKind {
                kind: kind.to_string(),
            });
        }
        let kind = kind.to_string();

        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedPayload {
            kind,
            message: e.to_string(),
        })
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            ServerEnvelope::AgentStarted(_) => EnvelopeKind::AgentStarted,
            ServerEnvelope::SubAgentUpdate(_) => EnvelopeKind::SubAgentUpdate,
            ServerEnvelope::AgentThinking(_) => EnvelopeKind::AgentThinking,
            ServerEnvelope::PartialResult(_) => EnvelopeKind::PartialResult,
            ServerEnvelope::ToolExecuting(_) => EnvelopeKind::ToolExecuting,
            ServerEnvelope::OptimizationComplete(_) => EnvelopeKind::OptimizationComplete,
            ServerEnvelope::AgentCompleted(_) => EnvelopeKind::AgentCompleted,
            ServerEnvelope::AgentError(_) => EnvelopeKind::AgentError,
            ServerEnvelope::MessageCreated(_) => EnvelopeKind::MessageCreated,
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            ServerEnvelope::AgentStarted(p) => &p.thread_id,
            ServerEnvelope::SubAgentUpdate(p) => &p.thread_id,
            ServerEnvelope::AgentThinking(p) => &p.thread_id,
            ServerEnvelope::PartialResult(p) => &p.thread_id,
            ServerEnvelope::ToolExecuting(p) => &p.thread_id,
            ServerEnvelope::OptimizationComplete(p) => &p.thread_id,
            ServerEnvelope::AgentCompleted(p) => &p.thread_id,
            ServerEnvelope::AgentError(p) => &p.thread_id,
            ServerEnvelope::MessageCreated(p) => &p.thread_id,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            ServerEnvelope::AgentStarted(p) => Some(&p.run_id),
            ServerEnvelope::SubAgentUpdate(p) => Some(&p.run_id),
            ServerEnvelope::AgentThinking(p) => Some(&p.run_id),
            ServerEnvelope::PartialResult(p) => Some(&p.run_id),
            ServerEnvelope::ToolExecuting(p) => Some(&p.run_id),
            ServerEnvelope::OptimizationComplete(p) => Some(&p.run_id),
            ServerEnvelope::AgentCompleted(p) => Some(&p.run_id),
            ServerEnvelope::AgentError(p) => p.run_id.as_deref(),
            ServerEnvelope::MessageCreated(_) => None,
        }
    }
}

/// Envelopes sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEnvelope {
    UserMessage(UserMessagePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessagePayload {
    pub content: String,
    pub thread_id: String,
    #[serde(default)]
    pub references: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl ClientEnvelope {
    pub fn user_message(
        content: impl Into<String>,
        thread_id: impl Into<String>,
        client_message_id: Option<String>,
    ) -> Self {
        ClientEnvelope::UserMessage(UserMessagePayload {
            content: content.into(),
            thread_id: thread_id.into(),
            references: Vec::new(),
            client_message_id,
        })
    }

    pub fn thread_id(&self) -> &str {
        match self {
            ClientEnvelope::UserMessage(p) => &p.thread_id,
        }
    }
}

//! Data models shared across the engine: messages, notices and wire envelopes.

mod envelope;
mod message;
mod notice;

pub use envelope::{
    AgentCompleted, AgentErrorPayload, AgentStarted, AgentThinking, ClientEnvelope,
    EnvelopeKind, MessageCreated, OptimizationComplete, PartialResult, ServerEnvelope,
    SubAgentStatus, SubAgentUpdate, ToolExecuting, UserMessagePayload,
};
pub use message::{Message, MessageRole, MessageStatus, WireMessage};
pub use notice::{Notice, NoticeSeverity};

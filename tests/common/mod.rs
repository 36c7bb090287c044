//! Common test utilities for integration tests.
//!
//! Envelope builders plus a harness that wires a [`ChatRuntime`] to the
//! in-crate mocks.
//!
//! # Example
//!
//! ```ignore
//! let mut h = TestHarness::new();
//! h.fetcher.set_page("t1", vec![]).await;
//! h.runtime.switch_to("t1").unwrap();
//! h.runtime.process_next_event().await;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use agentsync::adapters::mock::{MockThreadFetcher, MockTransport};
use agentsync::config::SyncConfig;
use agentsync::models::{
    AgentCompleted, AgentErrorPayload, AgentStarted, Message, MessageCreated, MessageRole,
    ServerEnvelope, SubAgentStatus, SubAgentUpdate, WireMessage,
};
use agentsync::runtime::{ChatRuntime, RuntimeEvent};
use agentsync::traits::StaticAuth;

pub type TestRuntime = ChatRuntime<MockTransport, MockThreadFetcher, StaticAuth>;

/// Runtime plus handles to the mocks behind it.
pub struct TestHarness {
    pub runtime: TestRuntime,
    pub transport: MockTransport,
    pub fetcher: MockThreadFetcher,
}

impl TestHarness {
    /// Authenticated runtime over an open mock transport.
    pub fn new() -> Self {
        Self::build(MockTransport::new(), StaticAuth::authenticated("test-user"))
    }

    /// Authenticated runtime whose transport has not connected yet.
    pub fn connecting() -> Self {
        Self::build(MockTransport::connecting(), StaticAuth::authenticated("test-user"))
    }

    pub fn build(transport: MockTransport, auth: StaticAuth) -> Self {
        let fetcher = MockThreadFetcher::new();
        let runtime = ChatRuntime::new(
            Arc::new(transport.clone()),
            Arc::new(fetcher.clone()),
            auth,
            &SyncConfig::default(),
        );
        Self {
            runtime,
            transport,
            fetcher,
        }
    }

    /// Feed an envelope through the runtime as if it came off the wire.
    pub fn deliver(&mut self, envelope: &ServerEnvelope) {
        let frame = serde_json::to_string(envelope).expect("envelope serializes");
        self.runtime.handle_event(RuntimeEvent::Frame(frame));
    }

    /// Switch to `thread_id` with the given page and wait for it to land.
    pub async fn open_thread(&mut self, thread_id: &str, messages: Vec<Message>) {
        self.fetcher.set_page(thread_id, messages).await;
        self.runtime.switch_to(thread_id).expect("valid thread id");
        assert!(self.runtime.process_next_event().await);
    }
}

pub fn agent_started(thread_id: &str, run_id: &str) -> ServerEnvelope {
    ServerEnvelope::AgentStarted(AgentStarted {
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
        agent_name: Some("Orchestrator".to_string()),
        timestamp: None,
    })
}

pub fn sub_agent_update(thread_id: &str, run_id: &str, status: SubAgentStatus) -> ServerEnvelope {
    ServerEnvelope::SubAgentUpdate(SubAgentUpdate {
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
        sub_agent_name: "DataAgent".to_string(),
        status,
        description: Some("Collecting usage data".to_string()),
        progress: Some(0.5),
        active_tools: vec!["query_costs".to_string()],
        metadata: None,
        timestamp: None,
    })
}

pub fn agent_completed(thread_id: &str, run_id: &str, report: &str) -> ServerEnvelope {
    ServerEnvelope::AgentCompleted(AgentCompleted {
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
        final_report: serde_json::json!({ "summary": report }),
        execution_time_ms: 4200,
        completed_agents: vec!["DataAgent".to_string()],
        metrics: None,
        message_id: None,
    })
}

pub fn agent_error(thread_id: &str, run_id: &str, recoverable: bool) -> ServerEnvelope {
    ServerEnvelope::AgentError(AgentErrorPayload {
        thread_id: thread_id.to_string(),
        run_id: Some(run_id.to_string()),
        kind: "connection_lost".to_string(),
        message: "Upstream connection lost".to_string(),
        is_recoverable: recoverable,
    })
}

pub fn message_created(
    thread_id: &str,
    id: &str,
    role: MessageRole,
    content: &str,
    client_message_id: Option<&str>,
) -> ServerEnvelope {
    ServerEnvelope::MessageCreated(MessageCreated {
        thread_id: thread_id.to_string(),
        message: WireMessage {
            id: id.to_string(),
            role,
            content: content.to_string(),
            created_at: None,
            displayed_to_user: true,
            metadata: None,
        },
        client_message_id: client_message_id.map(str::to_string),
    })
}

pub fn server_message(thread_id: &str, id: &str, content: &str) -> Message {
    Message::server(id, thread_id, MessageRole::Assistant, content)
}

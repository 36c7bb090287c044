//! Per-thread session: timeline, layered run state and notices.
//!
//! A session is only mutated through the router (as an [`EnvelopeSink`]) or
//! through the runtime's send pipeline. Switching threads replaces the whole
//! session; an old session is never touched again.

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::error::{AgentError, ProtocolError};
use crate::layers::{
    FastPatch, LayerOutcome, LayeredExecutionState, LayeredRunState, MediumPatch,
    OptimizationSummary, SlowPatch, SubAgentSnapshot,
};
use crate::models::{Message, MessageRole, Notice, NoticeSeverity, ServerEnvelope, SubAgentStatus};
use crate::router::EnvelopeSink;
use crate::timeline::MessageTimeline;

/// Notices kept per session; the oldest is dropped first.
pub const MAX_NOTICES: usize = 20;

/// Timing settings every new session inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub send_timeout: Duration,
    pub correlation_window: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SessionSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            send_timeout: config.send_timeout,
            correlation_window: config.correlation_window,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreadSession {
    thread_id: String,
    /// True while a background refresh of this thread is in flight
    is_loading: bool,
    timeline: MessageTimeline,
    layers: LayeredExecutionState,
    notices: Vec<Notice>,
}

impl ThreadSession {
    /// Empty session for a new thread.
    pub fn new(thread_id: impl Into<String>, settings: SessionSettings) -> Self {
        Self::with_messages(thread_id, Vec::new(), settings)
    }

    /// Session seeded with a fetched page.
    pub fn with_messages(
        thread_id: impl Into<String>,
        messages: Vec<Message>,
        settings: SessionSettings,
    ) -> Self {
        let thread_id = thread_id.into();
        Self {
            timeline: MessageTimeline::with_messages(
                thread_id.clone(),
                messages,
                settings.send_timeout,
                settings.correlation_window,
            ),
            thread_id,
            is_loading: false,
            layers: LayeredExecutionState::new(),
            notices: Vec::new(),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        self.timeline.messages()
    }

    pub fn timeline(&self) -> &MessageTimeline {
        &self.timeline
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut MessageTimeline {
        &mut self.timeline
    }

    pub fn layers(&self) -> &LayeredExecutionState {
        &self.layers
    }

    pub fn active_run(&self) -> Option<&LayeredRunState> {
        self.layers.active_run()
    }

    pub fn is_processing(&self) -> bool {
        self.layers.is_processing()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() >= MAX_NOTICES {
            let dropped = self.notices.remove(0);
            debug!(thread_id = %self.thread_id, notice_id = %dropped.id, "Dropping oldest notice");
        }
        self.notices.push(notice);
    }

    /// Remove a notice by id. Returns true if one was removed.
    pub fn dismiss_notice(&mut self, notice_id: &str) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != notice_id);
        self.notices.len() < before
    }

    fn check_thread(&self, envelope: &ServerEnvelope) -> Result<(), ProtocolError> {
        if envelope.thread_id() == self.thread_id {
            Ok(())
        } else {
            Err(ProtocolError::Unroutable {
                kind: envelope.kind().to_string(),
                reason: format!(
                    "envelope for thread {} delivered to session {}",
                    envelope.thread_id(),
                    self.thread_id
                ),
            })
        }
    }

    fn wrong_handler(envelope: &ServerEnvelope, handler: &str) -> ProtocolError {
        ProtocolError::Unroutable {
            kind: envelope.kind().to_string(),
            reason: format!("not handled by {}", handler),
        }
    }

    fn record_agent_error(&mut self, run_id: Option<&str>, error: AgentError) {
        let outcome = self.layers.apply_agent_error(run_id, error.clone());
        if matches!(
            outcome,
            LayerOutcome::IgnoredStale | LayerOutcome::IgnoredTerminal
        ) {
            debug!(thread_id = %self.thread_id, ?outcome, "Ignoring agent error");
            return;
        }

        let severity = if error.is_recoverable {
            warn!(
                thread_id = %self.thread_id,
                run_id = run_id.unwrap_or("-"),
                kind = %error.kind,
                "Recoverable agent error: {}",
                error.message
            );
            NoticeSeverity::Transient
        } else {
            error!(
                thread_id = %self.thread_id,
                run_id = run_id.unwrap_or("-"),
                kind = %error.kind,
                "Agent run failed: {}",
                error.message
            );
            NoticeSeverity::Error
        };
        self.push_notice(Notice::new(severity, error.kind, error.message));
    }
}

impl EnvelopeSink for ThreadSession {
    fn apply_layers(&mut self, envelope: &ServerEnvelope) -> Result<(), ProtocolError> {
        self.check_thread(envelope)?;

        let outcome = match envelope {
            ServerEnvelope::AgentStarted(p) => {
                self.layers
                    .start_run(&p.run_id, p.agent_name.clone(), p.timestamp)
            }
            ServerEnvelope::SubAgentUpdate(p) => {
                let working = matches!(
                    p.status,
                    SubAgentStatus::Running | SubAgentStatus::Retrying
                );
                let patch = FastPatch {
                    agent_name: working.then(|| p.sub_agent_name.clone()),
                    active_tools: (!p.active_tools.is_empty()).then(|| p.active_tools.clone()),
                    sub_agent: Some(SubAgentSnapshot {
                        name: p.sub_agent_name.clone(),
                        status: p.status,
                        description: p.description.clone(),
                        progress: p.progress,
                    }),
                    timestamp: p.timestamp,
                    ..Default::default()
                };
                self.layers.apply_fast(&p.run_id, patch)
            }
            ServerEnvelope::ToolExecuting(p) => {
                let patch = FastPatch {
                    agent_name: p.agent_name.clone(),
                    tool_started: Some(p.tool_name.clone()),
                    ..Default::default()
                };
                self.layers.apply_fast(&p.run_id, patch)
            }
            ServerEnvelope::AgentThinking(p) => {
                let patch = MediumPatch {
                    thought: Some(p.thought.clone()),
                    step: p.step_number,
                    total_steps: p.total_steps,
                    ..Default::default()
                };
                self.layers.apply_medium(&p.run_id, patch)
            }
            ServerEnvelope::PartialResult(p) => {
                let patch = MediumPatch {
                    partial_content: Some(p.content.clone()),
                    ..Default::default()
                };
                self.layers.apply_medium(&p.run_id, patch)
            }
            ServerEnvelope::OptimizationComplete(p) => {
                let patch = MediumPatch {
                    optimization: Some(OptimizationSummary {
                        analysis: p.analysis.clone(),
                        recommendations: p.recommendations.clone(),
                    }),
                    ..Default::default()
                };
                self.layers.apply_medium(&p.run_id, patch)
            }
            ServerEnvelope::AgentCompleted(p) => {
                let patch = SlowPatch {
                    completed_agents: p.completed_agents.clone(),
                    final_report: p.report_text(),
                    execution_time_ms: p.execution_time_ms,
                    metrics: p.metrics.clone(),
                };
                self.layers.apply_slow(&p.run_id, patch)
            }
            ServerEnvelope::AgentError(p) => {
                let error = AgentError::new(p.kind.clone(), p.message.clone(), p.is_recoverable);
                self.record_agent_error(p.run_id.as_deref(), error);
                return Ok(());
            }
            ServerEnvelope::MessageCreated(_) => {
                return Err(Self::wrong_handler(envelope, "layer state"));
            }
        };

        if matches!(
            outcome,
            LayerOutcome::IgnoredStale | LayerOutcome::IgnoredTerminal
        ) {
            debug!(
                thread_id = %self.thread_id,
                kind = %envelope.kind(),
                run_id = envelope.run_id().unwrap_or("-"),
                ?outcome,
                "Layer update ignored"
            );
        }
        Ok(())
    }

    fn apply_timeline(&mut self, envelope: &ServerEnvelope) -> Result<(), ProtocolError> {
        self.check_thread(envelope)?;

        match envelope {
            ServerEnvelope::MessageCreated(p) => {
                let message = p.message.clone().into_message(&self.thread_id);
                let outcome = self
                    .timeline
                    .reconcile_server_message(message, p.client_message_id.as_deref());
                debug!(thread_id = %self.thread_id, ?outcome, "Server message applied");
                Ok(())
            }
            ServerEnvelope::AgentCompleted(p) => {
                if self.layers.is_superseded(&p.run_id) {
                    debug!(thread_id = %self.thread_id, run_id = %p.run_id, "Dropping report of replaced run");
                    return Ok(());
                }
                let report = p.report_text();
                if report.is_empty() {
                    return Ok(());
                }
                // Without a server id the report stands in until message_created arrives
                match &p.message_id {
                    Some(id) => {
                        self.timeline.append(Message::server(
                            id.clone(),
                            &self.thread_id,
                            MessageRole::Assistant,
                            report,
                        ));
                    }
                    None => {
                        self.timeline.append_provisional(Message::server(
                            format!("report-{}", p.run_id),
                            &self.thread_id,
                            MessageRole::Assistant,
                            report,
                        ));
                    }
                }
                Ok(())
            }
            _ => Err(Self::wrong_handler(envelope, "timeline")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgentCompleted, AgentErrorPayload, AgentStarted, MessageCreated, SubAgentUpdate,
        WireMessage,
    };

    fn session() -> ThreadSession {
        ThreadSession::new("t-1", SessionSettings::default())
    }

    fn started(thread_id: &str, run_id: &str) -> ServerEnvelope {
        ServerEnvelope::AgentStarted(AgentStarted {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            agent_name: Some("Planner".to_string()),
            timestamp: None,
        })
    }

    fn update(run_id: &str, status: SubAgentStatus) -> ServerEnvelope {
        ServerEnvelope::SubAgentUpdate(SubAgentUpdate {
            thread_id: "t-1".to_string(),
            run_id: run_id.to_string(),
            sub_agent_name: "DataAgent".to_string(),
            status,
            description: Some("Collecting".to_string()),
            progress: Some(0.25),
            active_tools: vec!["sql".to_string()],
            metadata: None,
            timestamp: None,
        })
    }

    fn completed(run_id: &str, report: serde_json::Value) -> ServerEnvelope {
        ServerEnvelope::AgentCompleted(AgentCompleted {
            thread_id: "t-1".to_string(),
            run_id: run_id.to_string(),
            final_report: report,
            execution_time_ms: 900,
            completed_agents: vec!["DataAgent".to_string()],
            metrics: None,
            message_id: None,
        })
    }

    fn agent_error(recoverable: bool) -> ServerEnvelope {
        ServerEnvelope::AgentError(AgentErrorPayload {
            thread_id: "t-1".to_string(),
            run_id: Some("r1".to_string()),
            kind: "upstream".to_string(),
            message: "model overloaded".to_string(),
            is_recoverable: recoverable,
        })
    }

    #[test]
    fn test_sub_agent_update_fills_fast_layer() {
        let mut session = session();
        session.apply_layers(&started("t-1", "r1")).unwrap();
        session
            .apply_layers(&update("r1", SubAgentStatus::Running))
            .unwrap();

        let fast = session.active_run().unwrap().fast.as_ref().unwrap();
        assert_eq!(fast.agent_name.as_deref(), Some("DataAgent"));
        assert_eq!(fast.active_tools, vec!["sql"]);
        assert_eq!(fast.sub_agents.len(), 1);
        assert!(session.is_processing());
    }

    #[test]
    fn test_agent_completed_sets_slow_and_appends_report() {
        let mut session = session();
        let envelope = completed("r1", serde_json::json!({"summary": "All done"}));
        session.apply_layers(&envelope).unwrap();
        session.apply_timeline(&envelope).unwrap();

        assert!(!session.is_processing());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, "report-r1");
        assert_eq!(session.messages()[0].content, "All done");
        assert_eq!(session.messages()[0].role, MessageRole::Assistant);
    }

    #[test]
    fn test_empty_report_appends_nothing() {
        let mut session = session();
        let envelope = completed("r1", serde_json::Value::Null);
        session.apply_layers(&envelope).unwrap();
        session.apply_timeline(&envelope).unwrap();
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_recoverable_error_adds_transient_notice() {
        let mut session = session();
        session.apply_layers(&started("t-1", "r1")).unwrap();
        session.apply_layers(&agent_error(true)).unwrap();

        assert!(session.is_processing());
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].severity, NoticeSeverity::Transient);

        let id = session.notices()[0].id.clone();
        assert!(session.dismiss_notice(&id));
        assert!(!session.dismiss_notice(&id));
        assert!(session.notices().is_empty());
    }

    #[test]
    fn test_non_recoverable_error_stops_processing() {
        let mut session = session();
        session.apply_layers(&started("t-1", "r1")).unwrap();
        session.apply_layers(&agent_error(false)).unwrap();

        assert!(!session.is_processing());
        assert_eq!(session.notices()[0].severity, NoticeSeverity::Error);
    }

    #[test]
    fn test_wrong_thread_is_rejected() {
        let mut session = session();
        let result = session.apply_layers(&started("t-2", "r1"));
        assert!(matches!(result, Err(ProtocolError::Unroutable { .. })));
        assert!(session.active_run().is_none());
    }

    #[test]
    fn test_message_created_confirms_optimistic() {
        let mut session = session();
        let client_id = session.timeline_mut().add_optimistic("hi").unwrap();

        let envelope = ServerEnvelope::MessageCreated(MessageCreated {
            thread_id: "t-1".to_string(),
            message: WireMessage {
                id: "srv-1".to_string(),
                role: MessageRole::User,
                content: "hi".to_string(),
                created_at: None,
                displayed_to_user: true,
                metadata: None,
            },
            client_message_id: Some(client_id),
        });
        session.apply_timeline(&envelope).unwrap();

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, "srv-1");
        assert_eq!(session.timeline().pending_count(), 0);
    }

    fn assistant_created(id: &str, content: &str) -> ServerEnvelope {
        ServerEnvelope::MessageCreated(MessageCreated {
            thread_id: "t-1".to_string(),
            message: WireMessage {
                id: id.to_string(),
                role: MessageRole::Assistant,
                content: content.to_string(),
                created_at: None,
                displayed_to_user: true,
                metadata: None,
            },
            client_message_id: None,
        })
    }

    #[test]
    fn test_server_copy_replaces_report_placeholder() {
        let mut session = session();
        let envelope = completed("r1", serde_json::json!({"summary": "All done"}));
        session.apply_layers(&envelope).unwrap();
        session.apply_timeline(&envelope).unwrap();
        assert!(session.timeline().is_provisional("report-r1"));

        session
            .apply_timeline(&assistant_created("m1b", "All done"))
            .unwrap();

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, "m1b");
        assert!(!session.timeline().is_provisional("report-r1"));
    }

    #[test]
    fn test_report_after_server_copy_is_not_duplicated() {
        let mut session = session();
        session
            .apply_timeline(&assistant_created("m1b", "All done"))
            .unwrap();

        let envelope = completed("r1", serde_json::json!({"summary": "All done"}));
        session.apply_layers(&envelope).unwrap();
        session.apply_timeline(&envelope).unwrap();

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, "m1b");
    }

    #[test]
    fn test_replaced_run_report_is_dropped() {
        let mut session = session();
        session.apply_layers(&started("t-1", "r1")).unwrap();
        session.apply_layers(&started("t-1", "r2")).unwrap();

        let late = completed("r1", serde_json::json!({"summary": "Stale answer"}));
        session.apply_layers(&late).unwrap();
        session.apply_timeline(&late).unwrap();

        assert!(session.messages().is_empty());
        assert_eq!(session.active_run().unwrap().run_id, "r2");
        assert!(session.is_processing());
    }

    #[test]
    fn test_notices_are_capped() {
        let mut session = session();
        session.apply_layers(&started("t-1", "r1")).unwrap();
        for _ in 0..MAX_NOTICES + 5 {
            session.apply_layers(&agent_error(true)).unwrap();
        }
        assert_eq!(session.notices().len(), MAX_NOTICES);

        let first = session.notices()[0].id.clone();
        session.push_notice(Notice::new(NoticeSeverity::Transient, "info", "hello"));
        assert_eq!(session.notices().len(), MAX_NOTICES);
        assert!(session.notices().iter().all(|n| n.id != first));
        assert_eq!(session.notices().last().unwrap().message, "hello");
    }

    #[test]
    fn test_layer_envelope_rejected_by_timeline() {
        let mut session = session();
        assert!(session.apply_timeline(&started("t-1", "r1")).is_err());
    }
}

//! Per-run layered state
//!
//! A run carries three layers that fill in independently:
//! - fast: who is working and with which tools (highest churn)
//! - medium: what it is thinking, partial output, step counters
//! - slow: the final report; once set the run is terminal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::models::SubAgentStatus;

/// Latest known state of one sub-agent within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentSnapshot {
    pub name: String,
    pub status: SubAgentStatus,
    pub description: Option<String>,
    pub progress: Option<f64>,
}

impl SubAgentSnapshot {
    pub fn is_active(&self) -> bool {
        matches!(self.status, SubAgentStatus::Running | SubAgentStatus::Retrying)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastLayer {
    pub agent_name: Option<String>,
    pub active_tools: Vec<String>,
    /// Sub-agents in first-seen order
    pub sub_agents: Vec<SubAgentSnapshot>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub analysis: serde_json::Value,
    pub recommendations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediumLayer {
    pub thought: Option<String>,
    pub partial_content: String,
    pub step: Option<u32>,
    pub total_steps: Option<u32>,
    pub optimization: Option<OptimizationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowLayer {
    pub completed_agents: Vec<String>,
    pub final_report: String,
    pub execution_time_ms: u64,
    pub metrics: Option<serde_json::Value>,
}

/// Partial update to the fast layer. `None` fields leave the layer as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastPatch {
    pub agent_name: Option<String>,
    /// Replaces the active tool list
    pub active_tools: Option<Vec<String>>,
    /// Adds one tool to the active list
    pub tool_started: Option<String>,
    pub sub_agent: Option<SubAgentSnapshot>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Partial update to the medium layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediumPatch {
    pub thought: Option<String>,
    /// Appended to the accumulated partial content
    pub partial_content: Option<String>,
    pub step: Option<u32>,
    pub total_steps: Option<u32>,
    pub optimization: Option<OptimizationSummary>,
}

/// Terminal slow-layer payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlowPatch {
    pub completed_agents: Vec<String>,
    pub final_report: String,
    pub execution_time_ms: u64,
    pub metrics: Option<serde_json::Value>,
}

/// What happened to a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// The run is terminal; fast and medium are frozen and slow is set once
    IgnoredTerminal,
}

/// Layered view of a single agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredRunState {
    pub run_id: String,
    pub fast: Option<FastLayer>,
    pub medium: Option<MediumLayer>,
    pub slow: Option<SlowLayer>,
    /// Non-recoverable failure; the run is over
    pub terminal_error: Option<AgentError>,
    /// Most recent recoverable failure, cleared when the run makes progress
    pub transient_error: Option<AgentError>,
    /// Sub-agents reported completed before the slow layer arrived
    completed_agents: Vec<String>,
}

impl LayeredRunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            fast: None,
            medium: None,
            slow: None,
            terminal_error: None,
            transient_error: None,
            completed_agents: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.slow.is_some() || self.terminal_error.is_some()
    }

    pub fn is_processing(&self) -> bool {
        !self.is_terminal()
    }

    /// Names of sub-agents known to have completed, in first-seen order.
    pub fn completed_agents(&self) -> &[String] {
        match &self.slow {
            Some(slow) => &slow.completed_agents,
            None => &self.completed_agents,
        }
    }

    pub fn apply_fast(&mut self, patch: FastPatch) -> PatchOutcome {
        if self.is_terminal() {
            return PatchOutcome::IgnoredTerminal;
        }
        self.transient_error = None;

        let timestamp = patch.timestamp.unwrap_or_else(Utc::now);
        let fast = self.fast.get_or_insert_with(|| FastLayer {
            agent_name: None,
            active_tools: Vec::new(),
            sub_agents: Vec::new(),
            timestamp,
        });

        if let Some(name) = patch.agent_name {
            fast.agent_name = Some(name);
        }
        if let Some(tools) = patch.active_tools {
            fast.active_tools = tools;
        }
        if let Some(tool) = patch.tool_started {
            if !fast.active_tools.contains(&tool) {
                fast.active_tools.push(tool);
            }
        }
        if let Some(sub_agent) = patch.sub_agent {
            if sub_agent.status == SubAgentStatus::Completed
                && !self.completed_agents.contains(&sub_agent.name)
            {
                self.completed_agents.push(sub_agent.name.clone());
            }
            match fast.sub_agents.iter_mut().find(|s| s.name == sub_agent.name) {
                Some(existing) => *existing = sub_agent,
                None => fast.sub_agents.push(sub_agent),
            }
        }
        if timestamp > fast.timestamp {
            fast.timestamp = timestamp;
        }

        PatchOutcome::Applied
    }

    pub fn apply_medium(&mut self, patch: MediumPatch) -> PatchOutcome {
        if self.is_terminal() {
            return PatchOutcome::IgnoredTerminal;
        }
        self.transient_error = None;

        let medium = self.medium.get_or_insert_with(MediumLayer::default);
        if let Some(thought) = patch.thought {
            medium.thought = Some(thought);
        }
        if let Some(content) = patch.partial_content {
            medium.partial_content.push_str(&content);
        }
        // Step counters only move forward
        if let Some(step) = patch.step {
            medium.step = Some(medium.step.map_or(step, |current| current.max(step)));
        }
        if let Some(total) = patch.total_steps {
            medium.total_steps = Some(total);
        }
        if let Some(optimization) = patch.optimization {
            medium.optimization = Some(optimization);
        }

        PatchOutcome::Applied
    }

    /// Set the terminal slow layer. A second slow payload is ignored.
    pub fn apply_slow(&mut self, patch: SlowPatch) -> PatchOutcome {
        if self.slow.is_some() {
            return PatchOutcome::IgnoredTerminal;
        }

        let mut completed_agents = std::mem::take(&mut self.completed_agents);
        for name in patch.completed_agents {
            if !completed_agents.contains(&name) {
                completed_agents.push(name);
            }
        }

        self.transient_error = None;
        self.slow = Some(SlowLayer {
            completed_agents,
            final_report: patch.final_report,
            execution_time_ms: patch.execution_time_ms,
            metrics: patch.metrics,
        });
        PatchOutcome::Applied
    }

    /// Record an agent failure. Non-recoverable failures end the run.
    pub fn apply_error(&mut self, error: AgentError) -> PatchOutcome {
        if self.is_terminal() {
            return PatchOutcome::IgnoredTerminal;
        }
        if error.is_recoverable {
            self.transient_error = Some(error);
        } else {
            self.transient_error = None;
            self.terminal_error = Some(error);
        }
        PatchOutcome::Applied
    }
}

//! Layered Execution State for one thread.
//!
//! A thread has at most one active run. A new `run_id` replaces the active
//! run, and envelopes for replaced runs are ignored from then on.

mod run_state;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::AgentError;

pub use run_state::{
    FastLayer, FastPatch, LayeredRunState, MediumLayer, MediumPatch, OptimizationSummary,
    PatchOutcome, SlowLayer, SlowPatch, SubAgentSnapshot,
};

/// What a layer operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOutcome {
    Applied,
    /// The envelope started a new run, replacing any previous one
    Started,
    /// The run is terminal and the patch was dropped
    IgnoredTerminal,
    /// The envelope belongs to a run that has been replaced
    IgnoredStale,
    /// No run to apply the envelope to
    NoRun,
}

/// Replaced run ids remembered for stale-envelope checks.
pub const MAX_SUPERSEDED_RUNS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayeredExecutionState {
    active_run: Option<LayeredRunState>,
    /// Most recently replaced runs, oldest first
    superseded: VecDeque<String>,
}

impl LayeredExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_run(&self) -> Option<&LayeredRunState> {
        self.active_run.as_ref()
    }

    /// True iff a run exists that has neither a slow layer nor a terminal error.
    pub fn is_processing(&self) -> bool {
        self.active_run
            .as_ref()
            .is_some_and(LayeredRunState::is_processing)
    }

    /// True if `run_id` was replaced by a later run.
    pub fn is_superseded(&self, run_id: &str) -> bool {
        self.superseded.iter().any(|id| id == run_id)
    }

    fn remember_superseded(&mut self, run_id: String) {
        if self.superseded.len() >= MAX_SUPERSEDED_RUNS {
            self.superseded.pop_front();
        }
        self.superseded.push_back(run_id);
    }

    /// Find the run for `run_id`, starting it if it is new.
    fn run_for(&mut self, run_id: &str) -> Result<(&mut LayeredRunState, bool), LayerOutcome> {
        if self.is_superseded(run_id) {
            debug!(run_id, "Ignoring envelope for superseded run");
            return Err(LayerOutcome::IgnoredStale);
        }

        let is_current = self
            .active_run
            .as_ref()
            .is_some_and(|run| run.run_id == run_id);
        if !is_current {
            if let Some(previous) = self.active_run.take() {
                debug!(previous = %previous.run_id, run_id, "Run replaced");
                self.remember_superseded(previous.run_id);
            }
            self.active_run = Some(LayeredRunState::new(run_id));
        }

        match self.active_run.as_mut() {
            Some(run) => Ok((run, !is_current)),
            None => Err(LayerOutcome::NoRun),
        }
    }

    fn outcome(patch: PatchOutcome, started: bool) -> LayerOutcome {
        match (patch, started) {
            (PatchOutcome::IgnoredTerminal, _) => LayerOutcome::IgnoredTerminal,
            (PatchOutcome::Applied, true) => LayerOutcome::Started,
            (PatchOutcome::Applied, false) => LayerOutcome::Applied,
        }
    }

    /// Handle `agent_started`.
    pub fn start_run(
        &mut self,
        run_id: &str,
        agent_name: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> LayerOutcome {
        let patch = FastPatch {
            agent_name,
            timestamp: Some(timestamp.unwrap_or_else(Utc::now)),
            ..Default::default()
        };
        self.apply_fast(run_id, patch)
    }

    pub fn apply_fast(&mut self, run_id: &str, patch: FastPatch) -> LayerOutcome {
        match self.run_for(run_id) {
            Ok((run, started)) => Self::outcome(run.apply_fast(patch), started),
            Err(outcome) => outcome,
        }
    }

    pub fn apply_medium(&mut self, run_id: &str, patch: MediumPatch) -> LayerOutcome {
        match self.run_for(run_id) {
            Ok((run, started)) => Self::outcome(run.apply_medium(patch), started),
            Err(outcome) => outcome,
        }
    }

    /// Apply the terminal slow layer, creating a minimal run if none was seen.
    pub fn apply_slow(&mut self, run_id: &str, patch: SlowPatch) -> LayerOutcome {
        match self.run_for(run_id) {
            Ok((run, started)) => Self::outcome(run.apply_slow(patch), started),
            Err(outcome) => outcome,
        }
    }

    /// Apply an `agent_error`. Without a run id it targets the active run.
    pub fn apply_agent_error(&mut self, run_id: Option<&str>, error: AgentError) -> LayerOutcome {
        match run_id {
            Some(run_id) => match self.run_for(run_id) {
                Ok((run, started)) => Self::outcome(run.apply_error(error), started),
                Err(outcome) => outcome,
            },
            None => match self.active_run.as_mut() {
                Some(run) => Self::outcome(run.apply_error(error), false),
                None => LayerOutcome::NoRun,
            },
        }
    }
}

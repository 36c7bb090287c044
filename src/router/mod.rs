//! Event Router: validates inbound frames, drops duplicates and dispatches
//! each envelope to the layer state, the timeline, or both.
//!
//! Routing never fails from the caller's point of view. A frame that does not
//! parse, or a handler that rejects an envelope, is logged and counted; the
//! next envelope is routed normally.

mod dedup;
mod metrics;

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::ProtocolError;
use crate::models::{EnvelopeKind, ServerEnvelope};

pub use dedup::{DedupKey, DedupWindow};
pub use metrics::RouterMetrics;

/// Downstream handlers an envelope can be dispatched to.
///
/// Implemented by the thread session. Handlers report rejection as a
/// [`ProtocolError`]; the router records it and moves on.
pub trait EnvelopeSink {
    fn apply_layers(&mut self, envelope: &ServerEnvelope) -> Result<(), ProtocolError>;

    fn apply_timeline(&mut self, envelope: &ServerEnvelope) -> Result<(), ProtocolError>;
}

/// Which handlers receive an envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Layers,
    Timeline,
    Both,
}

impl Dispatch {
    pub fn for_kind(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::AgentStarted
            | EnvelopeKind::SubAgentUpdate
            | EnvelopeKind::AgentThinking
            | EnvelopeKind::PartialResult
            | EnvelopeKind::ToolExecuting
            | EnvelopeKind::OptimizationComplete
            | EnvelopeKind::AgentError => Dispatch::Layers,
            EnvelopeKind::MessageCreated => Dispatch::Timeline,
            EnvelopeKind::AgentCompleted => Dispatch::Both,
        }
    }
}

/// Result of routing one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Applied,
    Duplicate,
    /// A handler rejected the envelope
    Failed,
}

/// Routes envelopes into a sink with duplicate suppression and counters.
#[derive(Debug)]
pub struct EventRouter {
    dedup: DedupWindow,
    metrics: RouterMetrics,
}

impl EventRouter {
    pub fn new(dedup_window: Duration, dedup_capacity: usize) -> Self {
        Self {
            dedup: DedupWindow::new(dedup_window, dedup_capacity),
            metrics: RouterMetrics::default(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.dedup_window, config.dedup_capacity)
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    /// Validate a raw frame. Invalid frames are counted and logged.
    pub fn parse_frame(&mut self, frame: &str) -> Option<ServerEnvelope> {
        match ServerEnvelope::parse(frame) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                self.metrics.error_count += 1;
                warn!(
                    metric = "processing_error",
                    error_code = err.error_code(),
                    error = %err,
                    "Dropping invalid frame"
                );
                None
            }
        }
    }

    /// Count an envelope that belongs to no session of interest.
    pub fn record_ignored(&mut self, envelope: &ServerEnvelope) {
        self.metrics.ignored_count += 1;
        debug!(
            kind = %envelope.kind(),
            thread_id = %envelope.thread_id(),
            "Ignoring envelope for inactive thread"
        );
    }

    /// Route one envelope into `sink`.
    pub fn route<S>(&mut self, envelope: &ServerEnvelope, sink: &mut S) -> RouteOutcome
    where
        S: EnvelopeSink + ?Sized,
    {
        let started = Instant::now();
        let kind = envelope.kind();

        if self
            .dedup
            .check_and_insert(DedupKey::for_envelope(envelope), started)
        {
            self.metrics.dropped_count += 1;
            debug!(%kind, thread_id = %envelope.thread_id(), "Dropping duplicate envelope");
            return RouteOutcome::Duplicate;
        }

        let result = match Dispatch::for_kind(kind) {
            Dispatch::Layers => sink.apply_layers(envelope),
            Dispatch::Timeline => sink.apply_timeline(envelope),
            Dispatch::Both => sink
                .apply_layers(envelope)
                .and_then(|_| sink.apply_timeline(envelope)),
        };

        let ok = result.is_ok();
        self.metrics.record_route(started.elapsed(), ok);

        match result {
            Ok(()) => {
                debug!(
                    %kind,
                    thread_id = %envelope.thread_id(),
                    run_id = envelope.run_id().unwrap_or("-"),
                    "Routed envelope"
                );
                RouteOutcome::Applied
            }
            Err(err) => {
                warn!(
                    metric = "processing_error",
                    %kind,
                    thread_id = %envelope.thread_id(),
                    error_code = err.error_code(),
                    error = %err,
                    "Handler rejected envelope"
                );
                RouteOutcome::Failed
            }
        }
    }

    /// Parse and route a raw frame.
    pub fn route_raw<S>(&mut self, frame: &str, sink: &mut S) -> Option<RouteOutcome>
    where
        S: EnvelopeSink + ?Sized,
    {
        let envelope = self.parse_frame(frame)?;
        Some(self.route(&envelope, sink))
    }

    /// Forget remembered envelopes, e.g. when the active thread is replaced.
    pub fn reset_dedup(&mut self) {
        self.dedup.clear();
    }
}

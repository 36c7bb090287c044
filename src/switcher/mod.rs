//! Thread Switch Coordinator.
//!
//! Owns the active [`ThreadSession`] and the switch state machine:
//!
//! ```text
//! IDLE -> VALIDATING -> SWITCHING -> READY
//!                   \-> FAILED
//! ```
//!
//! Every switch request takes the next sequence number. A fetch result is
//! applied only if its ticket still carries the latest number, so an older
//! switch resolving late can never overwrite a newer one. While a switch is in
//! flight the previous session stays active and untouched; the new session
//! replaces it in one assignment.

mod validate;

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{FetchError, SwitchError};
use crate::models::{Message, ServerEnvelope};
use crate::session::{SessionSettings, ThreadSession};

pub use validate::validate_thread_id;

/// Phase of the most recent switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchPhase {
    #[default]
    Idle,
    Validating,
    Switching,
    Ready,
    Failed,
}

impl SwitchPhase {
    /// True while the loading indicator for a thread switch should show.
    pub fn is_loading(&self) -> bool {
        matches!(self, SwitchPhase::Validating | SwitchPhase::Switching)
    }
}

/// Handle for one fetch issued by the coordinator.
///
/// Carries the sequence number current when the fetch was issued; results
/// presented with an outdated ticket are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTicket {
    pub seq: u64,
    pub thread_id: String,
}

/// What a switch request needs from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequest {
    /// The thread is already active; nothing to fetch
    AlreadyActive,
    /// Fetch the initial page for the ticket's thread and hand it back
    Fetch(SwitchTicket),
}

/// Result of presenting a fetch result to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchCompletion {
    /// The new session is active; replay these buffered envelopes into it
    Applied { replay: Vec<ServerEnvelope> },
    /// A newer request superseded this one; the result was dropped
    Stale,
    /// The fetch failed; the previous session is still active
    Failed(SwitchError),
}

#[derive(Debug)]
pub struct ThreadSwitchCoordinator {
    settings: SessionSettings,
    active: Option<ThreadSession>,
    phase: SwitchPhase,
    seq: u64,
    target: Option<SwitchTicket>,
    buffer: VecDeque<ServerEnvelope>,
    buffer_limit: usize,
    last_error: Option<SwitchError>,
}

impl ThreadSwitchCoordinator {
    pub fn new(settings: SessionSettings, buffer_limit: usize) -> Self {
        Self {
            settings,
            active: None,
            phase: SwitchPhase::Idle,
            seq: 0,
            target: None,
            buffer: VecDeque::new(),
            buffer_limit: buffer_limit.max(1),
            last_error: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(SessionSettings::from(config), config.switch_buffer_limit)
    }

    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    /// Sequence number of the most recent request.
    pub fn current_seq(&self) -> u64 {
        self.seq
    }

    pub fn active_session(&self) -> Option<&ThreadSession> {
        self.active.as_ref()
    }

    pub(crate) fn active_session_mut(&mut self) -> Option<&mut ThreadSession> {
        self.active.as_mut()
    }

    pub fn active_thread_id(&self) -> Option<&str> {
        self.active.as_ref().map(ThreadSession::thread_id)
    }

    /// Thread currently being switched to, if any.
    pub fn pending_target(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.thread_id.as_str())
    }

    pub fn last_error(&self) -> Option<&SwitchError> {
        self.last_error.as_ref()
    }

    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Drop any in-flight switch or resync. Callers have already advanced
    /// the sequence number, so their results will be discarded as stale.
    fn cancel_pending(&mut self) {
        if let Some(previous) = self.target.take() {
            debug!(
                seq = previous.seq,
                thread_id = %previous.thread_id,
                "Cancelling in-flight switch"
            );
        }
        self.buffer.clear();
        if let Some(session) = self.active.as_mut().filter(|s| s.is_loading()) {
            debug!(thread_id = %session.thread_id(), "Cancelling in-flight resync");
            session.set_loading(false);
        }
    }

    /// Request a switch to `thread_id`.
    ///
    /// On success the coordinator is SWITCHING and the caller must fetch the
    /// ticket's thread and call [`complete_switch`](Self::complete_switch).
    /// An invalid id leaves the coordinator FAILED with the previous session
    /// intact. Either way any earlier in-flight switch is superseded.
    pub fn begin_switch(&mut self, thread_id: &str) -> Result<SwitchRequest, SwitchError> {
        let seq = self.next_seq();
        self.cancel_pending();
        self.phase = SwitchPhase::Validating;
        debug!(seq, thread_id, "Validating thread id");

        if let Err(err) = validate_thread_id(thread_id) {
            warn!(
                seq,
                thread_id,
                error_code = err.error_code(),
                "Switch rejected: {}",
                err
            );
            self.phase = SwitchPhase::Failed;
            self.last_error = Some(err.clone());
            return Err(err);
        }

        self.last_error = None;

        if self.active_thread_id() == Some(thread_id) {
            self.phase = SwitchPhase::Ready;
            debug!(seq, thread_id, "Thread already active");
            return Ok(SwitchRequest::AlreadyActive);
        }

        let ticket = SwitchTicket {
            seq,
            thread_id: thread_id.to_string(),
        };
        self.target = Some(ticket.clone());
        self.phase = SwitchPhase::Switching;
        info!(
            seq,
            thread_id,
            previous = self.active_thread_id().unwrap_or("-"),
            "Switching thread"
        );
        Ok(SwitchRequest::Fetch(ticket))
    }

    /// Present the fetch result for `ticket`.
    pub fn complete_switch(
        &mut self,
        ticket: &SwitchTicket,
        result: Result<Vec<Message>, FetchError>,
    ) -> SwitchCompletion {
        let is_current = self
            .target
            .as_ref()
            .is_some_and(|t| t.seq == ticket.seq && ticket.seq == self.seq);
        if !is_current {
            debug!(
                seq = ticket.seq,
                current_seq = self.seq,
                thread_id = %ticket.thread_id,
                "Discarding stale switch result"
            );
            return SwitchCompletion::Stale;
        }
        self.target = None;

        match result {
            Ok(messages) => {
                let count = messages.len();
                let session =
                    ThreadSession::with_messages(&ticket.thread_id, messages, self.settings);
                self.active = Some(session);
                self.phase = SwitchPhase::Ready;
                let replay: Vec<ServerEnvelope> = self.buffer.drain(..).collect();
                info!(
                    seq = ticket.seq,
                    thread_id = %ticket.thread_id,
                    messages = count,
                    replay = replay.len(),
                    "Thread ready"
                );
                SwitchCompletion::Applied { replay }
            }
            Err(source) => {
                let err = SwitchError::Fetch {
                    thread_id: ticket.thread_id.clone(),
                    source,
                };
                warn!(
                    seq = ticket.seq,
                    thread_id = %ticket.thread_id,
                    error_code = err.error_code(),
                    "Switch failed: {}",
                    err
                );
                self.buffer.clear();
                self.phase = SwitchPhase::Failed;
                self.last_error = Some(err.clone());
                SwitchCompletion::Failed(err)
            }
        }
    }

    /// Hold an envelope for the in-flight switch target.
    ///
    /// Returns false if the envelope is not for the target. When the buffer is
    /// full the oldest buffered envelope is dropped.
    pub fn buffer_for_target(&mut self, envelope: ServerEnvelope) -> bool {
        let is_target = self
            .target
            .as_ref()
            .is_some_and(|t| t.thread_id == envelope.thread_id());
        if !is_target {
            return false;
        }

        if self.buffer.len() >= self.buffer_limit {
            if let Some(dropped) = self.buffer.pop_front() {
                warn!(
                    thread_id = %dropped.thread_id(),
                    kind = %dropped.kind(),
                    limit = self.buffer_limit,
                    "Switch buffer full, dropping oldest envelope"
                );
            }
        }
        self.buffer.push_back(envelope);
        true
    }

    /// Activate an empty session for a thread that has no history yet.
    pub fn start_new_thread(&mut self, thread_id: &str) -> Result<(), SwitchError> {
        let seq = self.next_seq();
        self.cancel_pending();
        if let Err(err) = validate_thread_id(thread_id) {
            self.phase = SwitchPhase::Failed;
            self.last_error = Some(err.clone());
            return Err(err);
        }

        self.active = Some(ThreadSession::new(thread_id, self.settings));
        self.phase = SwitchPhase::Ready;
        self.last_error = None;
        info!(seq, thread_id, "Started new thread");
        Ok(())
    }

    /// Drop the active session and any in-flight switch.
    pub fn clear_session(&mut self) {
        let seq = self.next_seq();
        self.cancel_pending();
        if let Some(previous) = self.active.take() {
            info!(seq, thread_id = %previous.thread_id(), "Session cleared");
        }
        self.phase = SwitchPhase::Idle;
        self.last_error = None;
    }

    /// Start revalidating the active thread after a reconnect.
    ///
    /// Does not change the switch phase. Returns None when there is nothing
    /// to revalidate or a switch is already fetching fresh data.
    pub fn begin_resync(&mut self) -> Option<SwitchTicket> {
        if self.target.is_some() {
            return None;
        }
        let seq = self.seq;
        let session = self.active.as_mut()?;
        session.set_loading(true);
        info!(seq, thread_id = %session.thread_id(), "Resyncing active thread");
        Some(SwitchTicket {
            seq,
            thread_id: session.thread_id().to_string(),
        })
    }

    /// Merge a resync fetch into the active session.
    ///
    /// Returns how many messages changed, or None if the result was stale or
    /// the fetch failed. Local state (pending sends, run layers) is kept.
    pub fn complete_resync(
        &mut self,
        ticket: &SwitchTicket,
        result: Result<Vec<Message>, FetchError>,
    ) -> Option<usize> {
        if ticket.seq != self.seq {
            debug!(
                seq = ticket.seq,
                current_seq = self.seq,
                thread_id = %ticket.thread_id,
                "Discarding stale resync result"
            );
            return None;
        }
        let session = self
            .active
            .as_mut()
            .filter(|s| s.thread_id() == ticket.thread_id)?;
        session.set_loading(false);

        match result {
            Ok(messages) => {
                let changed = session.timeline_mut().merge_server_page(messages);
                info!(
                    seq = ticket.seq,
                    thread_id = %ticket.thread_id,
                    changed,
                    "Resync complete"
                );
                Some(changed)
            }
            Err(err) => {
                warn!(
                    seq = ticket.seq,
                    thread_id = %ticket.thread_id,
                    error_code = err.error_code(),
                    "Resync fetch failed: {}",
                    err
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentStarted, MessageRole};

    fn coordinator() -> ThreadSwitchCoordinator {
        ThreadSwitchCoordinator::new(SessionSettings::default(), 4)
    }

    fn fetch_ticket(request: SwitchRequest) -> SwitchTicket {
        match request {
            SwitchRequest::Fetch(ticket) => ticket,
            other => panic!("Expected Fetch, got {:?}", other),
        }
    }

    fn page(thread_id: &str, n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message::server(format!("m{i}"), thread_id, MessageRole::User, "x"))
            .collect()
    }

    fn started(thread_id: &str, run_id: &str) -> ServerEnvelope {
        ServerEnvelope::AgentStarted(AgentStarted {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            agent_name: None,
            timestamp: None,
        })
    }

    #[test]
    fn test_switch_happy_path() {
        let mut coord = coordinator();
        assert_eq!(coord.phase(), SwitchPhase::Idle);

        let ticket = fetch_ticket(coord.begin_switch("t1").unwrap());
        assert_eq!(coord.phase(), SwitchPhase::Switching);
        assert!(coord.active_session().is_none());

        let completion = coord.complete_switch(&ticket, Ok(page("t1", 2)));
        assert_eq!(completion, SwitchCompletion::Applied { replay: vec![] });
        assert_eq!(coord.phase(), SwitchPhase::Ready);
        assert_eq!(coord.active_thread_id(), Some("t1"));
        assert_eq!(coord.active_session().unwrap().messages().len(), 2);
    }

    #[test]
    fn test_previous_session_stays_during_switch() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 3)));

        coord.begin_switch("t2").unwrap();
        assert_eq!(coord.phase(), SwitchPhase::Switching);
        assert_eq!(coord.active_thread_id(), Some("t1"));
        assert_eq!(coord.active_session().unwrap().messages().len(), 3);
    }

    #[test]
    fn test_stale_completion_is_discarded_in_either_order() {
        // B resolves before A
        let mut coord = coordinator();
        let a = fetch_ticket(coord.begin_switch("a").unwrap());
        let b = fetch_ticket(coord.begin_switch("b").unwrap());
        assert!(matches!(
            coord.complete_switch(&b, Ok(page("b", 1))),
            SwitchCompletion::Applied { .. }
        ));
        assert_eq!(coord.complete_switch(&a, Ok(page("a", 5))), SwitchCompletion::Stale);
        assert_eq!(coord.active_thread_id(), Some("b"));

        // A resolves before B
        let mut coord = coordinator();
        let a = fetch_ticket(coord.begin_switch("a").unwrap());
        let b = fetch_ticket(coord.begin_switch("b").unwrap());
        assert_eq!(coord.complete_switch(&a, Ok(page("a", 5))), SwitchCompletion::Stale);
        assert_eq!(coord.phase(), SwitchPhase::Switching);
        coord.complete_switch(&b, Ok(page("b", 1)));
        assert_eq!(coord.active_thread_id(), Some("b"));
    }

    #[test]
    fn test_invalid_id_fails_and_keeps_session() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let err = coord.begin_switch("bad id").unwrap_err();
        assert!(matches!(err, SwitchError::InvalidThreadId { .. }));
        assert_eq!(coord.phase(), SwitchPhase::Failed);
        assert_eq!(coord.active_thread_id(), Some("t1"));
        assert!(coord.last_error().is_some());
    }

    #[test]
    fn test_fetch_failure_keeps_previous_session() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let t2 = fetch_ticket(coord.begin_switch("t2").unwrap());
        let completion = coord.complete_switch(
            &t2,
            Err(FetchError::NotFound {
                thread_id: "t2".to_string(),
            }),
        );
        assert!(matches!(completion, SwitchCompletion::Failed(_)));
        assert_eq!(coord.phase(), SwitchPhase::Failed);
        assert_eq!(coord.active_thread_id(), Some("t1"));
    }

    #[test]
    fn test_switch_to_active_thread_is_noop() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        assert_eq!(coord.begin_switch("t1").unwrap(), SwitchRequest::AlreadyActive);
        assert_eq!(coord.phase(), SwitchPhase::Ready);
    }

    #[test]
    fn test_returning_to_active_thread_cancels_pending_switch() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let t2 = fetch_ticket(coord.begin_switch("t2").unwrap());
        assert_eq!(coord.begin_switch("t1").unwrap(), SwitchRequest::AlreadyActive);
        assert_eq!(coord.complete_switch(&t2, Ok(page("t2", 1))), SwitchCompletion::Stale);
        assert_eq!(coord.active_thread_id(), Some("t1"));
    }

    #[test]
    fn test_buffered_envelopes_replay_after_swap() {
        let mut coord = coordinator();
        let ticket = fetch_ticket(coord.begin_switch("t2").unwrap());

        assert!(coord.buffer_for_target(started("t2", "r1")));
        assert!(!coord.buffer_for_target(started("t9", "r1")));

        match coord.complete_switch(&ticket, Ok(vec![])) {
            SwitchCompletion::Applied { replay } => {
                assert_eq!(replay, vec![started("t2", "r1")]);
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
        assert_eq!(coord.buffered_count(), 0);
    }

    #[test]
    fn test_buffer_drops_oldest_when_full() {
        let mut coord = coordinator();
        coord.begin_switch("t2").unwrap();
        for i in 0..6 {
            coord.buffer_for_target(started("t2", &format!("r{i}")));
        }
        assert_eq!(coord.buffered_count(), 4);
    }

    #[test]
    fn test_new_switch_clears_buffer_of_superseded_target() {
        let mut coord = coordinator();
        coord.begin_switch("a").unwrap();
        coord.buffer_for_target(started("a", "r1"));
        coord.begin_switch("b").unwrap();
        assert_eq!(coord.buffered_count(), 0);
    }

    #[test]
    fn test_start_new_thread_and_clear() {
        let mut coord = coordinator();
        coord.start_new_thread("fresh").unwrap();
        assert_eq!(coord.phase(), SwitchPhase::Ready);
        assert!(coord.active_session().unwrap().messages().is_empty());

        coord.clear_session();
        assert_eq!(coord.phase(), SwitchPhase::Idle);
        assert!(coord.active_session().is_none());
    }

    #[test]
    fn test_resync_merges_without_switching_phase() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let ticket = coord.begin_resync().unwrap();
        assert_eq!(coord.phase(), SwitchPhase::Ready);
        assert!(coord.active_session().unwrap().is_loading());

        assert_eq!(coord.complete_resync(&ticket, Ok(page("t1", 3))), Some(2));
        assert_eq!(coord.active_session().unwrap().messages().len(), 3);
        assert!(!coord.active_session().unwrap().is_loading());
    }

    #[test]
    fn test_resync_result_discarded_after_switch() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let resync = coord.begin_resync().unwrap();
        let t2 = fetch_ticket(coord.begin_switch("t2").unwrap());
        coord.complete_switch(&t2, Ok(vec![]));

        assert_eq!(coord.complete_resync(&resync, Ok(page("t1", 5))), None);
        assert!(coord.active_session().unwrap().messages().is_empty());
    }

    #[test]
    fn test_superseded_resync_clears_loading() {
        let mut coord = coordinator();
        let t1 = fetch_ticket(coord.begin_switch("t1").unwrap());
        coord.complete_switch(&t1, Ok(page("t1", 1)));

        let resync = coord.begin_resync().unwrap();
        assert!(coord.active_session().unwrap().is_loading());

        assert_eq!(coord.begin_switch("t1"), Ok(SwitchRequest::AlreadyActive));
        assert!(!coord.active_session().unwrap().is_loading());

        assert_eq!(coord.complete_resync(&resync, Ok(page("t1", 3))), None);
        assert!(!coord.active_session().unwrap().is_loading());
        assert_eq!(coord.active_session().unwrap().messages().len(), 1);
    }

    #[test]
    fn test_no_resync_without_session() {
        let mut coord = coordinator();
        assert!(coord.begin_resync().is_none());
    }
}

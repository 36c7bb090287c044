//! Composition root: wires transport, router, coordinator and fetcher into a
//! single-owner event loop.
//!
//! All state lives in [`ChatRuntime`] and is mutated only from its methods,
//! one event at a time. Async work (thread fetches) runs in spawned tasks that
//! post their results back as [`RuntimeEvent`]s, the same way UI input does
//! through [`RuntimeCommand`]s.

mod events;
mod snapshot;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::connection::ConnectionState;
use crate::error::{AuthError, FetchError, SwitchError, SyncResult, TimelineError};
use crate::loading::LoadingState;
use crate::models::{ClientEnvelope, Message, Notice, NoticeSeverity, ServerEnvelope};
use crate::router::{EventRouter, RouterMetrics};
use crate::session::ThreadSession;
use crate::switcher::{SwitchCompletion, SwitchRequest, SwitchTicket, ThreadSwitchCoordinator};
use crate::traits::{AuthProvider, ThreadFetcher, Transport};

pub use events::{RuntimeCommand, RuntimeEvent};
pub use snapshot::RenderSnapshot;

type FetchResult = Result<Vec<Message>, FetchError>;

/// Client-side synchronization engine for one backend connection.
pub struct ChatRuntime<T, F, A>
where
    T: Transport + 'static,
    F: ThreadFetcher + 'static,
    A: AuthProvider,
{
    transport: Arc<T>,
    fetcher: Arc<F>,
    auth: A,
    router: EventRouter,
    coordinator: ThreadSwitchCoordinator,
    connection: ConnectionState,
    loading: LoadingState,
    send_timeout: Duration,
    sweep_interval: Duration,
    event_tx: mpsc::UnboundedSender<RuntimeEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<RuntimeEvent>>,
    snapshot_tx: watch::Sender<RenderSnapshot>,
}

impl<T, F, A> ChatRuntime<T, F, A>
where
    T: Transport + 'static,
    F: ThreadFetcher + 'static,
    A: AuthProvider,
{
    pub fn new(transport: Arc<T>, fetcher: Arc<F>, auth: A, config: &SyncConfig) -> Self {
        let connection = transport.state().borrow().clone();
        let coordinator = ThreadSwitchCoordinator::from_config(config);
        let snapshot = RenderSnapshot::capture(&connection, &coordinator);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(snapshot.clone());

        Self {
            transport,
            fetcher,
            auth,
            router: EventRouter::from_config(config),
            coordinator,
            connection,
            loading: snapshot.loading,
            send_timeout: config.send_timeout,
            sweep_interval: config.pending_sweep_interval,
            event_tx,
            event_rx: Some(event_rx),
            snapshot_tx,
        }
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive a fresh [`RenderSnapshot`] after every state change.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<RenderSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn coordinator(&self) -> &ThreadSwitchCoordinator {
        &self.coordinator
    }

    pub fn active_session(&self) -> Option<&ThreadSession> {
        self.coordinator.active_session()
    }

    pub fn router_metrics(&self) -> &RouterMetrics {
        self.router.metrics()
    }

    /// Sender for posting events from outside the loop.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<RuntimeEvent> {
        self.event_tx.clone()
    }

    // ========== User actions ==========

    /// Send a user message on the active thread.
    ///
    /// Inserts an optimistic pending message and sends it with its client id.
    /// Returns that client id. Rejected synchronously, without touching the
    /// timeline, when unauthenticated, empty, mid-switch, or no thread is
    /// active.
    pub async fn send_message(&mut self, content: &str) -> SyncResult<String> {
        self.ensure_authenticated()?;
        if content.trim().is_empty() {
            return Err(TimelineError::EmptyContent.into());
        }
        self.ensure_not_switching()?;

        let session = self
            .coordinator
            .active_session_mut()
            .ok_or(TimelineError::NoActiveThread)?;
        let client_id = session.timeline_mut().add_optimistic(content)?;
        let envelope = ClientEnvelope::user_message(
            content.trim(),
            session.thread_id(),
            Some(client_id.clone()),
        );
        info!(thread_id = %session.thread_id(), %client_id, "Sending message");
        self.publish();

        self.deliver(&client_id, envelope).await?;
        Ok(client_id)
    }

    /// Re-send a failed message under its original client id.
    pub async fn retry(&mut self, client_id: &str) -> SyncResult<()> {
        self.ensure_authenticated()?;
        self.ensure_not_switching()?;

        let session = self
            .coordinator
            .active_session_mut()
            .ok_or(TimelineError::NoActiveThread)?;
        let content = session.timeline_mut().retry(client_id)?;
        let envelope = ClientEnvelope::user_message(
            content,
            session.thread_id(),
            Some(client_id.to_string()),
        );
        info!(thread_id = %session.thread_id(), client_id, "Retrying message");
        self.publish();

        self.deliver(client_id, envelope).await
    }

    /// Switch the active thread. The fetch runs in the background.
    pub fn switch_to(&mut self, thread_id: &str) -> Result<(), SwitchError> {
        let request = self.coordinator.begin_switch(thread_id);
        if let Ok(SwitchRequest::Fetch(ticket)) = &request {
            self.spawn_fetch(ticket.clone(), |ticket, result| RuntimeEvent::SwitchLoaded {
                ticket,
                result,
            });
        }
        self.publish();
        request.map(|_| ())
    }

    /// Activate an empty session for a brand-new thread.
    pub fn start_new_thread(&mut self, thread_id: &str) -> Result<(), SwitchError> {
        let result = self.coordinator.start_new_thread(thread_id);
        self.publish();
        result
    }

    pub fn clear_session(&mut self) {
        self.coordinator.clear_session();
        self.router.reset_dedup();
        self.publish();
    }

    pub fn dismiss_notice(&mut self, notice_id: &str) -> bool {
        let dismissed = self
            .coordinator
            .active_session_mut()
            .is_some_and(|s| s.dismiss_notice(notice_id));
        if dismissed {
            self.publish();
        }
        dismissed
    }

    pub async fn handle_command(&mut self, command: RuntimeCommand) {
        let result: SyncResult<()> = match command {
            RuntimeCommand::SendMessage(content) => self.send_message(&content).await.map(|_| ()),
            RuntimeCommand::Retry(client_id) => self.retry(&client_id).await,
            RuntimeCommand::SwitchTo(thread_id) => self.switch_to(&thread_id).map_err(Into::into),
            RuntimeCommand::StartNewThread(thread_id) => {
                self.start_new_thread(&thread_id).map_err(Into::into)
            }
            RuntimeCommand::ClearSession => {
                self.clear_session();
                Ok(())
            }
            RuntimeCommand::DismissNotice(notice_id) => {
                self.dismiss_notice(&notice_id);
                Ok(())
            }
            RuntimeCommand::Shutdown => {
                self.transport.shutdown();
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!(error_code = err.error_code(), "Command failed: {}", err);
        }
    }

    fn ensure_authenticated(&self) -> Result<(), AuthError> {
        if self.auth.is_authenticated() {
            return Ok(());
        }
        error!(
            error_code = AuthError::NotAuthenticated.error_code(),
            "Rejecting send: not authenticated"
        );
        Err(AuthError::NotAuthenticated)
    }

    /// Sends are refused while the active thread is about to be replaced.
    fn ensure_not_switching(&self) -> Result<(), TimelineError> {
        match self.coordinator.pending_target() {
            Some(target) if self.coordinator.phase().is_loading() => {
                warn!(thread_id = target, "Rejecting send: thread switch in progress");
                Err(TimelineError::SwitchInProgress {
                    thread_id: target.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Hand an envelope to the transport, failing the message if it refuses.
    async fn deliver(&mut self, client_id: &str, envelope: ClientEnvelope) -> SyncResult<()> {
        let Err(err) = self.transport.send(envelope).await else {
            return Ok(());
        };

        if let Some(session) = self.coordinator.active_session_mut() {
            let reason = err.to_string();
            if session.timeline_mut().fail(client_id, &reason).is_ok() {
                session.push_notice(Notice::new(NoticeSeverity::Error, err.error_code(), reason));
            }
        }
        self.publish();
        Err(err.into())
    }

    // ========== Event handling ==========

    /// Apply one event and publish the resulting snapshot.
    pub fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Frame(frame) => {
                if let Some(envelope) = self.router.parse_frame(&frame) {
                    self.ingest(envelope);
                }
            }
            RuntimeEvent::Connection(state) => self.on_connection(state),
            RuntimeEvent::SwitchLoaded { ticket, result } => self.on_switch_loaded(ticket, result),
            RuntimeEvent::ResyncLoaded { ticket, result } => {
                self.coordinator.complete_resync(&ticket, result);
            }
            RuntimeEvent::Tick(now) => self.sweep_pending(now),
        }
        self.publish();
    }

    /// Wait for the next internally posted event (fetch results).
    pub async fn next_event(&mut self) -> Option<RuntimeEvent> {
        self.event_rx.as_mut()?.recv().await
    }

    /// Wait for and apply the next internally posted event.
    pub async fn process_next_event(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Re-read the transport's connection state.
    pub fn sync_connection(&mut self) {
        let state = self.transport.state().borrow().clone();
        self.handle_event(RuntimeEvent::Connection(state));
    }

    /// Route to the active session, or buffer for the switch target.
    ///
    /// Once a switch is requested the previous session is frozen: its
    /// envelopes are counted as ignored like any other thread's.
    fn ingest(&mut self, envelope: ServerEnvelope) {
        let thread_id = envelope.thread_id();
        match self.coordinator.pending_target() {
            Some(target) if target == thread_id => {
                debug!(thread_id, kind = %envelope.kind(), "Buffering envelope for switch target");
                self.coordinator.buffer_for_target(envelope);
            }
            Some(_) => self.router.record_ignored(&envelope),
            None if self.coordinator.active_thread_id() == Some(thread_id) => {
                if let Some(session) = self.coordinator.active_session_mut() {
                    self.router.route(&envelope, session);
                }
            }
            None => self.router.record_ignored(&envelope),
        }
    }

    fn on_connection(&mut self, state: ConnectionState) {
        let previous = std::mem::replace(&mut self.connection, state);
        if previous.phase != self.connection.phase {
            info!(
                from = previous.phase.as_str(),
                to = self.connection.phase.as_str(),
                attempts = self.connection.reconnect_attempt_count,
                "Connection phase changed"
            );
        }

        if self.connection.is_open() && self.connection.open_epoch != previous.open_epoch {
            if let Some(ticket) = self.coordinator.begin_resync() {
                self.spawn_fetch(ticket, |ticket, result| RuntimeEvent::ResyncLoaded {
                    ticket,
                    result,
                });
            }
        }
    }

    fn on_switch_loaded(&mut self, ticket: SwitchTicket, result: FetchResult) {
        match self.coordinator.complete_switch(&ticket, result) {
            SwitchCompletion::Applied { replay } => {
                if let Some(session) = self.coordinator.active_session_mut() {
                    for envelope in &replay {
                        self.router.route(envelope, session);
                    }
                }
            }
            SwitchCompletion::Stale => {}
            SwitchCompletion::Failed(err) => {
                if let Some(session) = self.coordinator.active_session_mut() {
                    session.push_notice(Notice::new(
                        NoticeSeverity::Error,
                        err.error_code(),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    fn sweep_pending(&mut self, now: Instant) {
        let timeout_ms = u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX);
        let Some(session) = self.coordinator.active_session_mut() else {
            return;
        };

        for client_id in session.timeline_mut().expire_pending(now) {
            let err = TimelineError::SendTimeout {
                client_id,
                timeout_ms,
            };
            session.push_notice(Notice::new(
                NoticeSeverity::Error,
                err.error_code(),
                err.to_string(),
            ));
        }
    }

    fn spawn_fetch(&self, ticket: SwitchTicket, into_event: fn(SwitchTicket, FetchResult) -> RuntimeEvent) {
        let fetcher = Arc::clone(&self.fetcher);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_initial_messages(&ticket.thread_id).await;
            let _ = event_tx.send(into_event(ticket, result));
        });
    }

    fn publish(&mut self) {
        let snapshot = RenderSnapshot::capture(&self.connection, &self.coordinator);
        if snapshot.loading != self.loading {
            info!(from = %self.loading, to = %snapshot.loading, "Loading state changed");
            self.loading = snapshot.loading;
        }
        self.snapshot_tx.send_if_modified(move |current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    // ========== Main loop ==========

    /// Drive the runtime until shutdown.
    ///
    /// Applies inbound frames, connection changes, fetch results, sweep ticks
    /// and user commands one at a time. Returns when a
    /// [`RuntimeCommand::Shutdown`] arrives, the command channel closes, or the
    /// transport stops delivering frames.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<RuntimeCommand>) {
        let Some(mut events) = self.event_rx.take() else {
            warn!("Runtime loop is already running");
            return;
        };
        let mut frames = self.transport.subscribe();
        let mut state_rx = self.transport.state();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.sync_connection();
        info!(loading = %self.loading, "Runtime started");

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Ok(frame) => self.handle_event(RuntimeEvent::Frame(frame)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Frame receiver lagged, frames were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Transport closed its frame stream");
                        break;
                    }
                },
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    self.handle_event(RuntimeEvent::Connection(state));
                }
                Some(event) = events.recv() => self.handle_event(event),
                tick = sweep.tick() => self.handle_event(RuntimeEvent::Tick(tick.into_std())),
                command = commands.recv() => match command {
                    Some(RuntimeCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }

        self.event_rx = Some(events);
        self.transport.shutdown();
        info!("Runtime stopped");
    }
}

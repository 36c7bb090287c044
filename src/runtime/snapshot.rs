use crate::connection::ConnectionState;
use crate::error::SwitchError;
use crate::layers::LayeredRunState;
use crate::loading::{derive_loading_state, LoadingInputs, LoadingState};
use crate::models::{Message, Notice};
use crate::switcher::{SwitchPhase, ThreadSwitchCoordinator};

/// Read-only view of everything the rendering layer needs.
///
/// Rebuilt after each discrete state change and published on a watch
/// channel, so renderers never observe a half-applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub loading: LoadingState,
    pub connection: ConnectionState,
    pub switch_phase: SwitchPhase,
    pub switch_error: Option<SwitchError>,
    pub thread_id: Option<String>,
    /// True while the active thread is being refreshed after a reconnect
    pub session_loading: bool,
    /// Messages shown to the user, in timeline order
    pub messages: Vec<Message>,
    pub active_run: Option<LayeredRunState>,
    pub is_processing: bool,
    pub notices: Vec<Notice>,
}

impl RenderSnapshot {
    pub fn capture(connection: &ConnectionState, coordinator: &ThreadSwitchCoordinator) -> Self {
        let loading = derive_loading_state(&LoadingInputs::capture(connection, coordinator));
        let session = coordinator.active_session();

        Self {
            loading,
            connection: connection.clone(),
            switch_phase: coordinator.phase(),
            switch_error: coordinator.last_error().cloned(),
            thread_id: session.map(|s| s.thread_id().to_string()),
            session_loading: session.is_some_and(|s| s.is_loading()),
            messages: session
                .map(|s| s.timeline().visible_messages().cloned().collect())
                .unwrap_or_default(),
            active_run: session.and_then(|s| s.active_run().cloned()),
            is_processing: session.is_some_and(|s| s.is_processing()),
            notices: session.map(|s| s.notices().to_vec()).unwrap_or_default(),
        }
    }
}

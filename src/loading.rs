//! Loading State Machine.
//!
//! [`derive_loading_state`] is a pure, total function of the connection
//! phase, the switch phase, the active session and the processing flag. Rules
//! are evaluated top to bottom and the first match wins; the value is never
//! stored, only recomputed when one of its inputs changes.

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionPhase, ConnectionState};
use crate::switcher::{SwitchPhase, ThreadSwitchCoordinator};

/// What the UI should render right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingState {
    Initializing,
    Connecting,
    ConnectionFailed,
    LoadingThread,
    ThreadReady,
    Ready,
    Processing,
    NoThread,
}

impl LoadingState {
    pub const ALL: [LoadingState; 8] = [
        LoadingState::Initializing,
        LoadingState::Connecting,
        LoadingState::ConnectionFailed,
        LoadingState::LoadingThread,
        LoadingState::ThreadReady,
        LoadingState::Ready,
        LoadingState::Processing,
        LoadingState::NoThread,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingState::Initializing => "INITIALIZING",
            LoadingState::Connecting => "CONNECTING",
            LoadingState::ConnectionFailed => "CONNECTION_FAILED",
            LoadingState::LoadingThread => "LOADING_THREAD",
            LoadingState::ThreadReady => "THREAD_READY",
            LoadingState::Ready => "READY",
            LoadingState::Processing => "PROCESSING",
            LoadingState::NoThread => "NO_THREAD",
        }
    }
}

impl std::fmt::Display for LoadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to [`derive_loading_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingInputs {
    pub connection: ConnectionPhase,
    pub switch: SwitchPhase,
    pub has_session: bool,
    pub session_is_empty: bool,
    pub is_processing: bool,
}

impl LoadingInputs {
    /// Collect the inputs from live engine state.
    pub fn capture(connection: &ConnectionState, coordinator: &ThreadSwitchCoordinator) -> Self {
        let session = coordinator.active_session();
        Self {
            connection: connection.phase,
            switch: coordinator.phase(),
            has_session: session.is_some(),
            session_is_empty: session.map_or(true, |s| s.timeline().is_empty()),
            is_processing: session.is_some_and(|s| s.is_processing()),
        }
    }
}

/// Map engine state to exactly one [`LoadingState`].
///
/// A connection that is still making its first attempt shows INITIALIZING
/// when there is nothing to render and CONNECTING otherwise. A dropped or
/// reconnecting connection shows CONNECTION_FAILED whether or not another
/// attempt is scheduled.
pub fn derive_loading_state(inputs: &LoadingInputs) -> LoadingState {
    match inputs.connection {
        ConnectionPhase::Connecting if !inputs.has_session => return LoadingState::Initializing,
        ConnectionPhase::Connecting => return LoadingState::Connecting,
        ConnectionPhase::Reconnecting | ConnectionPhase::Closed => {
            return LoadingState::ConnectionFailed
        }
        ConnectionPhase::Open => {}
    }

    if inputs.switch.is_loading() {
        LoadingState::LoadingThread
    } else if !inputs.has_session {
        LoadingState::NoThread
    } else if inputs.is_processing {
        LoadingState::Processing
    } else if inputs.session_is_empty {
        LoadingState::ThreadReady
    } else {
        LoadingState::Ready
    }
}

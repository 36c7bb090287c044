//! Messages flowing into the runtime loop.

use std::time::Instant;

use crate::connection::ConnectionState;
use crate::error::FetchError;
use crate::models::Message;
use crate::switcher::SwitchTicket;

/// Results of async work and transport activity, applied one at a time.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Raw inbound text frame from the transport
    Frame(String),
    /// Connection state changed
    Connection(ConnectionState),
    /// Initial page for a switch request resolved
    SwitchLoaded {
        ticket: SwitchTicket,
        result: Result<Vec<Message>, FetchError>,
    },
    /// Page for a post-reconnect resync resolved
    ResyncLoaded {
        ticket: SwitchTicket,
        result: Result<Vec<Message>, FetchError>,
    },
    /// Periodic sweep of overdue pending sends
    Tick(Instant),
}

/// User actions accepted by [`ChatRuntime::run`](super::ChatRuntime::run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCommand {
    SendMessage(String),
    Retry(String),
    SwitchTo(String),
    StartNewThread(String),
    ClearSession,
    DismissNotice(String),
    Shutdown,
}

//! Connection Adapter: the single WebSocket link to the agent backend.
//!
//! - [`ConnectionAdapter`] - tungstenite-backed [`Transport`](crate::traits::Transport)
//! - [`ConnectionState`] / [`ConnectionPhase`] - observable lifecycle
//! - [`OutboundQueue`] - FIFO for envelopes sent while not open
//! - [`Backoff`] - reconnect delay schedule

mod backoff;
mod client;
mod outbound;
mod state;

pub use backoff::Backoff;
pub use client::{ConnectionAdapter, ConnectionConfig};
pub use outbound::OutboundQueue;
pub use state::{ConnectionPhase, ConnectionState};

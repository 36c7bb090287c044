//! agentsync - event ingestion and layered state synchronization for agent
//! chat clients.
//!
//! The engine keeps a chat UI consistent with a multi-stage agent backend
//! over one WebSocket: it owns the connection lifecycle, routes inbound
//! envelopes into per-thread layered run state and message timelines,
//! reconciles optimistic sends, coordinates thread switches, and derives a
//! single [`loading::LoadingState`] for the renderer.
//!
//! [`runtime::ChatRuntime`] wires everything together; the other modules are
//! usable on their own.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod layers;
pub mod loading;
pub mod logging;
pub mod models;
pub mod router;
pub mod runtime;
pub mod session;
pub mod switcher;
pub mod timeline;
pub mod traits;

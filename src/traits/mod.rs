//! Trait abstractions for dependency injection and testability.
//!
//! The runtime is generic over these seams so tests can drive it with the
//! mocks in [`crate::adapters::mock`] instead of a live backend.
//!
//! # Traits
//!
//! - [`Transport`] - the backend connection (send, inbound frames, state)
//! - [`ThreadFetcher`] - initial message page for a thread
//! - [`AuthProvider`] - whether the user may send

pub mod auth;
pub mod fetch;
pub mod transport;

pub use auth::{AuthProvider, StaticAuth};
pub use fetch::ThreadFetcher;
pub use transport::Transport;

//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`HttpThreadFetcher`] - thread page fetching over the REST API
//! - [`ConnectionAdapter`](crate::connection::ConnectionAdapter) lives in
//!   [`crate::connection`] and implements [`Transport`](crate::traits::Transport)
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockTransport`] - frame injection and sent-envelope capture
//! - [`mock::MockThreadFetcher`] - canned or gated thread pages

pub mod http_fetch;
pub mod mock;

pub use http_fetch::HttpThreadFetcher;
pub use mock::{MockThreadFetcher, MockTransport};

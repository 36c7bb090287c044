//! Mock implementations for testing.
//!
//! These let the runtime be exercised without a backend: frames are injected
//! by hand, connection phases are driven explicitly and fetches can be held
//! open to reproduce out-of-order completion.
//!
//! # Available Mocks
//!
//! - [`MockTransport`] - frame injection, phase control, sent-envelope capture
//! - [`MockThreadFetcher`] - canned pages, injected failures, gated responses

pub mod fetch;
pub mod transport;

pub use fetch::MockThreadFetcher;
pub use transport::MockTransport;

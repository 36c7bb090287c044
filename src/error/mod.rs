//! Unified error handling for the synchronization engine.
//!
//! Failures inside the engine are represented as state wherever possible;
//! the types here exist for the few synchronous surfaces (`send_message`,
//! `retry`, configuration loading) and for structured logging.
//!
//! | Category | Source | Retryable |
//! |----------|--------|-----------|
//! | Network | transport drops, send timeouts, fetch I/O | Yes |
//! | Protocol | malformed / unknown envelopes | No |
//! | Auth | send while unauthenticated | No |
//! | Agent | `agent_error` envelopes | When recoverable |
//! | User | empty input, bad thread id, invalid retry | No |
//! | Configuration | env / URL problems | No |

mod agent;
mod auth;
mod category;
mod config;
mod protocol;
mod result;
mod switch;
mod sync_error;
mod timeline;
mod transport;

pub use agent::AgentError;
pub use auth::AuthError;
pub use category::ErrorCategory;
pub use config::ConfigError;
pub use protocol::ProtocolError;
pub use result::SyncResult;
pub use switch::{FetchError, SwitchError};
pub use sync_error::SyncError;
pub use timeline::TimelineError;
pub use transport::TransportError;

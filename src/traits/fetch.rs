//! Initial thread page fetching.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::Message;

/// Loads the persisted messages of a thread.
///
/// Used when switching to a thread and when resyncing after a reconnect.
/// Returned messages are confirmed and in server order.
#[async_trait]
pub trait ThreadFetcher: Send + Sync {
    async fn fetch_initial_messages(&self, thread_id: &str) -> Result<Vec<Message>, FetchError>;
}

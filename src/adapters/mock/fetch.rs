//! Mock thread fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::error::FetchError;
use crate::models::Message;
use crate::traits::ThreadFetcher;

/// Mock thread fetcher with canned pages.
///
/// Threads without a configured page answer `NotFound`. A gated thread's
/// fetch blocks until the returned sender fires (or is dropped), which lets
/// tests finish switches in any order.
#[derive(Clone, Default)]
pub struct MockThreadFetcher {
    pages: Arc<Mutex<HashMap<String, Result<Vec<Message>, FetchError>>>>,
    gates: Arc<Mutex<HashMap<String, oneshot::Receiver<()>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockThreadFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_page(&self, thread_id: &str, messages: Vec<Message>) {
        self.pages
            .lock()
            .await
            .insert(thread_id.to_string(), Ok(messages));
    }

    pub async fn set_error(&self, thread_id: &str, error: FetchError) {
        self.pages
            .lock()
            .await
            .insert(thread_id.to_string(), Err(error));
    }

    /// Hold the next fetch of `thread_id` until the returned sender fires.
    pub async fn gate(&self, thread_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(thread_id.to_string(), rx);
        tx
    }

    /// Thread ids fetched so far, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ThreadFetcher for MockThreadFetcher {
    async fn fetch_initial_messages(&self, thread_id: &str) -> Result<Vec<Message>, FetchError> {
        self.calls.lock().await.push(thread_id.to_string());

        let gate = self.gates.lock().await.remove(thread_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.pages
            .lock()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::NotFound {
                    thread_id: thread_id.to_string(),
                })
            })
    }
}

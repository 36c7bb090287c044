//! Reqwest-based thread fetcher.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::models::{Message, WireMessage};
use crate::traits::ThreadFetcher;

/// Body of `GET /threads/{id}/messages`: either a bare array or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessagePage {
    Bare(Vec<WireMessage>),
    Wrapped { messages: Vec<WireMessage> },
}

impl MessagePage {
    fn into_messages(self) -> Vec<WireMessage> {
        match self {
            MessagePage::Bare(messages) | MessagePage::Wrapped { messages } => messages,
        }
    }
}

/// Fetches thread pages from `{api_base}/threads/{id}/messages`.
#[derive(Debug, Clone)]
pub struct HttpThreadFetcher {
    /// Base URL of the REST API, without trailing slash
    pub api_base: String,
    client: Client,
    auth_token: Option<String>,
}

impl HttpThreadFetcher {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base)
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
            auth_token: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.api_base.clone())
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn messages_url(&self, thread_id: &str) -> String {
        format!(
            "{}/threads/{}/messages",
            self.api_base,
            urlencoding::encode(thread_id)
        )
    }
}

#[async_trait]
impl ThreadFetcher for HttpThreadFetcher {
    async fn fetch_initial_messages(&self, thread_id: &str) -> Result<Vec<Message>, FetchError> {
        let url = self.messages_url(thread_id);
        debug!(%url, "Fetching thread messages");

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                thread_id: thread_id.to_string(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let page: MessagePage =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(page
            .into_messages()
            .into_iter()
            .map(|wire| wire.into_message(thread_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url_encodes_thread_id() {
        let fetcher = HttpThreadFetcher::new("http://localhost:8000/api/");
        assert_eq!(
            fetcher.messages_url("thread 1/x"),
            "http://localhost:8000/api/threads/thread%201%2Fx/messages"
        );
    }

    #[test]
    fn test_message_page_accepts_both_shapes() {
        let bare = r#"[{"id": "m1", "role": "user", "content": "hi"}]"#;
        let wrapped = r#"{"messages": [{"id": "m1", "role": "assistant", "content": "yo"}]}"#;

        let bare: MessagePage = serde_json::from_str(bare).unwrap();
        let wrapped: MessagePage = serde_json::from_str(wrapped).unwrap();
        assert_eq!(bare.into_messages()[0].id, "m1");
        assert_eq!(wrapped.into_messages()[0].content, "yo");
    }

    #[test]
    fn test_from_config_uses_api_base() {
        let config = SyncConfig::default().with_api_base("https://example.com/api");
        let fetcher = HttpThreadFetcher::from_config(&config);
        assert_eq!(fetcher.api_base, "https://example.com/api");
    }
}

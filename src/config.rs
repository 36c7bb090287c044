//! Engine configuration.
//!
//! Use the builder methods to customize behaviour, or [`SyncConfig::from_env`]
//! to layer `AGENTSYNC_*` environment variables over the defaults.
//!
//! ```ignore
//! use agentsync::config::SyncConfig;
//!
//! let config = SyncConfig::default()
//!     .with_ws_url("ws://localhost:8000/ws")
//!     .with_send_timeout(Duration::from_secs(10));
//! ```

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_WS_URL: &str = "AGENTSYNC_WS_URL";
pub const ENV_API_BASE: &str = "AGENTSYNC_API_BASE";
pub const ENV_MAX_RETRIES: &str = "AGENTSYNC_MAX_RETRIES";
pub const ENV_MAX_BACKOFF_SECS: &str = "AGENTSYNC_MAX_BACKOFF_SECS";
pub const ENV_SEND_TIMEOUT_SECS: &str = "AGENTSYNC_SEND_TIMEOUT_SECS";
pub const ENV_DEDUP_WINDOW_SECS: &str = "AGENTSYNC_DEDUP_WINDOW_SECS";

/// Configuration for the synchronization engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// WebSocket endpoint of the agent backend
    pub ws_url: String,
    /// Base URL of the REST API used to fetch thread pages
    pub api_base: String,
    /// Reconnect attempts before giving up (None retries forever)
    pub max_retries: Option<u32>,
    /// First reconnect delay; doubles per attempt
    pub initial_backoff: Duration,
    /// Upper bound on the reconnect delay
    pub max_backoff: Duration,
    /// How long an optimistic message may stay pending
    pub send_timeout: Duration,
    /// How long a routed envelope is remembered for duplicate detection
    pub dedup_window: Duration,
    /// Maximum number of remembered envelopes
    pub dedup_capacity: usize,
    /// Max distance between send time and server timestamp for content correlation
    pub correlation_window: Duration,
    /// Envelopes buffered for a thread while switching to it
    pub switch_buffer_limit: usize,
    /// How often pending messages are checked for timeout
    pub pending_sweep_interval: Duration,
    /// Envelopes queued while the socket is not open
    pub outbound_queue_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8000/ws".to_string(),
            api_base: "http://127.0.0.1:8000/api".to_string(),
            max_retries: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            send_timeout: Duration::from_secs(30),
            dedup_window: Duration::from_secs(10),
            dedup_capacity: 512,
            correlation_window: Duration::from_secs(30),
            switch_buffer_limit: 256,
            pending_sweep_interval: Duration::from_secs(1),
            outbound_queue_limit: 1024,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_dedup_window(mut self, window: Duration, capacity: usize) -> Self {
        self.dedup_window = window;
        self.dedup_capacity = capacity;
        self
    }

    pub fn with_correlation_window(mut self, window: Duration) -> Self {
        self.correlation_window = window;
        self
    }

    pub fn with_switch_buffer_limit(mut self, limit: usize) -> Self {
        self.switch_buffer_limit = limit;
        self
    }

    pub fn with_pending_sweep_interval(mut self, interval: Duration) -> Self {
        self.pending_sweep_interval = interval;
        self
    }

    pub fn with_outbound_queue_limit(mut self, limit: usize) -> Self {
        self.outbound_queue_limit = limit;
        self
    }

    /// Build a config from the defaults overridden by `AGENTSYNC_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = read_var(ENV_WS_URL) {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::UnsupportedUrl {
                    setting: ENV_WS_URL.to_string(),
                    url,
                });
            }
            config.ws_url = url;
        }
        if let Some(url) = read_var(ENV_API_BASE) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::UnsupportedUrl {
                    setting: ENV_API_BASE.to_string(),
                    url,
                });
            }
            config.api_base = url.trim_end_matches('/').to_string();
        }
        if let Some(retries) = parse_var::<u32>(ENV_MAX_RETRIES)? {
            config.max_retries = Some(retries);
        }
        if let Some(secs) = parse_var::<u64>(ENV_MAX_BACKOFF_SECS)? {
            config.max_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(ENV_SEND_TIMEOUT_SECS)? {
            config.send_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(ENV_DEDUP_WINDOW_SECS)? {
            config.dedup_window = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn read_var(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match read_var(var) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
                message: e.to_string(),
            }),
    }
}

//! Sliding-window duplicate detection for inbound envelopes.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::models::{EnvelopeKind, ServerEnvelope};

/// Identity of an envelope for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub kind: EnvelopeKind,
    pub thread_id: String,
    /// Message id for `message_created`, sha256 of the payload otherwise
    pub fingerprint: String,
}

impl DedupKey {
    pub fn for_envelope(envelope: &ServerEnvelope) -> Self {
        let fingerprint = match envelope {
            ServerEnvelope::MessageCreated(p) => format!("id:{}", p.message.id),
            other => content_hash(other),
        };
        Self {
            kind: envelope.kind(),
            thread_id: envelope.thread_id().to_string(),
            fingerprint,
        }
    }
}

fn content_hash(envelope: &ServerEnvelope) -> String {
    let bytes = serde_json::to_vec(envelope).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Remembers recently seen keys for `window`, holding at most `capacity`.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    capacity: usize,
    order: VecDeque<(Instant, DedupKey)>,
    seen: HashSet<DedupKey>,
}

impl DedupWindow {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Record `key` at `now`. Returns true if it was already in the window.
    pub fn check_and_insert(&mut self, key: DedupKey, now: Instant) -> bool {
        self.evict_expired(now);
        if self.seen.contains(&key) {
            return true;
        }

        if self.order.len() >= self.capacity {
            if let Some((_, oldest)) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back((now, key));
        false
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((seen_at, _)) = self.order.front() {
            if now.saturating_duration_since(*seen_at) < self.window {
                break;
            }
            if let Some((_, key)) = self.order.pop_front() {
                self.seen.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentThinking, MessageCreated, MessageRole, WireMessage};

    fn thinking(thought: &str) -> ServerEnvelope {
        ServerEnvelope::AgentThinking(AgentThinking {
            thread_id: "t-1".to_string(),
            run_id: "r-1".to_string(),
            thought: thought.to_string(),
            agent_name: None,
            step_number: None,
            total_steps: None,
        })
    }

    #[test]
    fn test_identical_envelopes_share_a_key() {
        assert_eq!(
            DedupKey::for_envelope(&thinking("a")),
            DedupKey::for_envelope(&thinking("a"))
        );
        assert_ne!(
            DedupKey::for_envelope(&thinking("a")),
            DedupKey::for_envelope(&thinking("b"))
        );
    }

    #[test]
    fn test_message_created_keyed_by_id() {
        let created = |content: &str| {
            ServerEnvelope::MessageCreated(MessageCreated {
                thread_id: "t-1".to_string(),
                message: WireMessage {
                    id: "m-1".to_string(),
                    role: MessageRole::Assistant,
                    content: content.to_string(),
                    created_at: None,
                    displayed_to_user: true,
                    metadata: None,
                },
                client_message_id: None,
            })
        };
        let key = DedupKey::for_envelope(&created("first"));
        assert_eq!(key.fingerprint, "id:m-1");
        assert_eq!(key, DedupKey::for_envelope(&created("edited")));
    }

    #[test]
    fn test_duplicate_within_window() {
        let mut window = DedupWindow::new(Duration::from_secs(10), 16);
        let now = Instant::now();
        let key = DedupKey::for_envelope(&thinking("a"));

        assert!(!window.check_and_insert(key.clone(), now));
        assert!(window.check_and_insert(key, now + Duration::from_secs(1)));
    }

    #[test]
    fn test_key_expires_after_window() {
        let mut window = DedupWindow::new(Duration::from_secs(10), 16);
        let now = Instant::now();
        let key = DedupKey::for_envelope(&thinking("a"));

        assert!(!window.check_and_insert(key.clone(), now));
        assert!(!window.check_and_insert(key, now + Duration::from_secs(11)));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut window = DedupWindow::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        let a = DedupKey::for_envelope(&thinking("a"));
        let b = DedupKey::for_envelope(&thinking("b"));
        let c = DedupKey::for_envelope(&thinking("c"));

        window.check_and_insert(a.clone(), now);
        window.check_and_insert(b, now);
        window.check_and_insert(c, now);

        assert_eq!(window.len(), 2);
        assert!(!window.check_and_insert(a, now));
    }
}

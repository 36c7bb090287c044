//! Message Timeline: the ordered message list of one thread, including
//! optimistic user messages awaiting server confirmation.
//!
//! Display order is insertion order. Confirming an optimistic message updates
//! it in place; it never moves to where the server copy would sort.

mod reconciliation;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::TimelineError;
use crate::models::{Message, MessageStatus};

pub use reconciliation::Reconciliation;

/// Reason recorded on messages failed by the send-timeout sweep.
pub const SEND_TIMEOUT_REASON: &str = "send timed out";

#[derive(Debug, Clone)]
pub struct MessageTimeline {
    thread_id: String,
    messages: Vec<Message>,
    /// Send deadlines of pending optimistic messages, by client id
    deadlines: HashMap<String, Instant>,
    /// Locally synthesized messages a server copy may still replace
    provisional: HashSet<String>,
    send_timeout: Duration,
    correlation_window: Duration,
}

impl MessageTimeline {
    pub fn new(thread_id: impl Into<String>, send_timeout: Duration, correlation_window: Duration) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            deadlines: HashMap::new(),
            provisional: HashSet::new(),
            send_timeout,
            correlation_window,
        }
    }

    /// Build a timeline from a fetched page. Duplicate ids keep the first copy.
    pub fn with_messages(
        thread_id: impl Into<String>,
        messages: Vec<Message>,
        send_timeout: Duration,
        correlation_window: Duration,
    ) -> Self {
        let mut timeline = Self::new(thread_id, send_timeout, correlation_window);
        for message in messages {
            timeline.append(message);
        }
        timeline
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages the user should see.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.displayed_to_user)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn find_by_client_id(&self, client_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.client_id.as_deref() == Some(client_id))
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }

    fn position_of_client_id(&self, client_id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.client_id.as_deref() == Some(client_id))
    }

    /// Append a pending user message and return its client id.
    pub fn add_optimistic(&mut self, content: &str) -> Result<String, TimelineError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TimelineError::EmptyContent);
        }

        let message = Message::optimistic(&self.thread_id, content.to_string());
        let client_id = message.id.clone();
        self.deadlines
            .insert(client_id.clone(), Instant::now() + self.send_timeout);
        self.messages.push(message);

        debug!(thread_id = %self.thread_id, %client_id, "Added optimistic message");
        Ok(client_id)
    }

    /// Confirm the optimistic message `client_id` with the server's copy.
    ///
    /// The message keeps its position and takes the server id, timestamp and
    /// content. A late confirmation also rescues a message the timeout failed.
    pub fn confirm(&mut self, client_id: &str, server: Message) -> Result<(), TimelineError> {
        let index = self
            .position_of_client_id(client_id)
            .ok_or_else(|| TimelineError::UnknownMessage {
                client_id: client_id.to_string(),
            })?;

        // The server copy may already be present, e.g. from a resync page.
        let duplicate = self
            .messages
            .iter()
            .enumerate()
            .find(|(i, m)| *i != index && m.id == server.id)
            .map(|(i, _)| i);
        let index = match duplicate {
            Some(dup) => {
                self.messages.remove(dup);
                if dup < index {
                    index - 1
                } else {
                    index
                }
            }
            None => index,
        };

        let message = &mut self.messages[index];
        message.id = server.id;
        message.created_at = server.created_at;
        message.content = server.content;
        message.displayed_to_user = server.displayed_to_user;
        if server.metadata.is_some() {
            message.metadata = server.metadata;
        }
        message.status = MessageStatus::Confirmed;
        message.failure_reason = None;
        self.deadlines.remove(client_id);

        debug!(thread_id = %self.thread_id, client_id, "Confirmed optimistic message");
        Ok(())
    }

    /// Mark a pending message failed. The message stays visible for retry.
    ///
    /// Messages that are no longer pending are left untouched.
    pub fn fail(&mut self, client_id: &str, reason: &str) -> Result<(), TimelineError> {
        let index = self
            .position_of_client_id(client_id)
            .ok_or_else(|| TimelineError::UnknownMessage {
                client_id: client_id.to_string(),
            })?;

        let message = &mut self.messages[index];
        if message.status != MessageStatus::Pending {
            return Ok(());
        }
        message.status = MessageStatus::Failed;
        message.failure_reason = Some(reason.to_string());
        self.deadlines.remove(client_id);

        warn!(thread_id = %self.thread_id, client_id, reason, "Message send failed");
        Ok(())
    }

    /// Move a failed message back to pending and re-arm its timeout.
    ///
    /// Returns the content to send again.
    pub fn retry(&mut self, client_id: &str) -> Result<String, TimelineError> {
        let index = self
            .position_of_client_id(client_id)
            .ok_or_else(|| TimelineError::UnknownMessage {
                client_id: client_id.to_string(),
            })?;

        let message = &mut self.messages[index];
        if message.status != MessageStatus::Failed {
            return Err(TimelineError::InvalidRetry {
                client_id: client_id.to_string(),
                status: message.status,
            });
        }
        message.status = MessageStatus::Pending;
        message.failure_reason = None;
        let content = message.content.clone();
        self.deadlines
            .insert(client_id.to_string(), Instant::now() + self.send_timeout);

        debug!(thread_id = %self.thread_id, client_id, "Retrying message");
        Ok(content)
    }

    /// Append a server-originated message. Returns false for a duplicate id.
    pub fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(thread_id = %self.thread_id, id = %message.id, "Ignoring duplicate message");
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Append a locally synthesized message that a later server copy with
    /// the same role and content will replace in place.
    ///
    /// Skipped when the most recent message of that role already carries the
    /// same content, i.e. the server copy arrived first.
    pub fn append_provisional(&mut self, message: Message) -> bool {
        let content = message.content.trim();
        let already_present = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == message.role)
            .is_some_and(|m| m.content.trim() == content);
        if already_present {
            debug!(thread_id = %self.thread_id, id = %message.id, "Server copy already present");
            return false;
        }

        let id = message.id.clone();
        if !self.append(message) {
            return false;
        }
        self.provisional.insert(id);
        true
    }

    pub fn is_provisional(&self, id: &str) -> bool {
        self.provisional.contains(id)
    }

    /// Fail every pending message whose deadline is at or before `now`.
    ///
    /// Returns the client ids that were failed.
    pub fn expire_pending(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(client_id, _)| client_id.clone())
            .collect();
        expired.sort_by_key(|id| self.position_of_client_id(id));

        for client_id in &expired {
            // Deadlines only exist for messages we created.
            let _ = self.fail(client_id, SEND_TIMEOUT_REASON);
        }
        expired
    }
}

//! Correlation of server messages with optimistic sends, and page merging
//! for MessageTimeline

use chrono::Duration as ChronoDuration;
use tracing::debug;

use crate::models::{Message, MessageRole, MessageStatus};

use super::MessageTimeline;

/// How a server message landed in the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Matched and confirmed an optimistic message
    Confirmed { client_id: String },
    /// Replaced a provisional local copy in place
    Replaced { provisional_id: String },
    /// Added as a new message
    Appended,
    /// Already present; nothing changed
    Duplicate,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        !matches!(self, Reconciliation::Duplicate)
    }
}

impl MessageTimeline {
    /// Find the optimistic message a server user message confirms.
    ///
    /// An echoed client id is authoritative. Without one, the oldest
    /// unconfirmed optimistic message with the same trimmed content whose
    /// creation time is within the correlation window matches.
    fn correlate(&self, server: &Message, client_message_id: Option<&str>) -> Option<String> {
        if let Some(echo) = client_message_id {
            return self
                .messages
                .iter()
                .find(|m| {
                    m.client_id.as_deref() == Some(echo) && m.status != MessageStatus::Confirmed
                })
                .and_then(|m| m.client_id.clone());
        }

        let window = ChronoDuration::from_std(self.correlation_window)
            .unwrap_or_else(|_| ChronoDuration::seconds(30));
        let content = server.content.trim();

        self.messages
            .iter()
            .filter(|m| m.is_optimistic() && m.status != MessageStatus::Confirmed)
            .filter(|m| m.thread_id == server.thread_id && m.content.trim() == content)
            .find(|m| {
                let delta = server.created_at - m.created_at;
                delta <= window && delta >= -window
            })
            .and_then(|m| m.client_id.clone())
    }

    /// Swap the oldest provisional message with the same role and content
    /// for `server`, keeping its position.
    fn replace_provisional(&mut self, server: &Message) -> Option<String> {
        let content = server.content.trim();
        let index = self.messages.iter().position(|m| {
            self.provisional.contains(&m.id) && m.role == server.role && m.content.trim() == content
        })?;

        let message = &mut self.messages[index];
        let provisional_id = std::mem::replace(&mut message.id, server.id.clone());
        message.created_at = server.created_at;
        message.content = server.content.clone();
        message.displayed_to_user = server.displayed_to_user;
        if server.metadata.is_some() {
            message.metadata = server.metadata.clone();
        }
        self.provisional.remove(&provisional_id);

        debug!(
            thread_id = %self.thread_id,
            provisional_id = %provisional_id,
            id = %server.id,
            "Replaced provisional message with server copy"
        );
        Some(provisional_id)
    }

    /// Apply a server message: confirm a matching optimistic send, or append.
    pub fn reconcile_server_message(
        &mut self,
        server: Message,
        client_message_id: Option<&str>,
    ) -> Reconciliation {
        if self.messages.iter().any(|m| m.id == server.id) {
            debug!(thread_id = %self.thread_id, id = %server.id, "Server message already present");
            return Reconciliation::Duplicate;
        }

        if server.role == MessageRole::User {
            if let Some(client_id) = self.correlate(&server, client_message_id) {
                return match self.confirm(&client_id, server) {
                    Ok(()) => Reconciliation::Confirmed { client_id },
                    Err(_) => Reconciliation::Duplicate,
                };
            }
        }

        if let Some(provisional_id) = self.replace_provisional(&server) {
            return Reconciliation::Replaced { provisional_id };
        }

        if self.append(server) {
            Reconciliation::Appended
        } else {
            Reconciliation::Duplicate
        }
    }

    /// Merge a freshly fetched page without dropping local state.
    ///
    /// Known ids are skipped, user messages may confirm pending sends,
    /// provisional copies are replaced, the rest are appended. Returns how many messages changed.
    pub fn merge_server_page(&mut self, page: Vec<Message>) -> usize {
        page.into_iter()
            .map(|message| self.reconcile_server_message(message, None))
            .filter(Reconciliation::changed)
            .count()
    }
}

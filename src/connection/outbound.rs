//! FIFO queue for envelopes sent while the connection is not open.

use std::collections::VecDeque;

use tracing::warn;

use crate::models::ClientEnvelope;

/// Bounded FIFO of envelopes awaiting an open connection.
///
/// When full, the oldest envelope is dropped; the optimistic message it
/// carried will fail through the send timeout rather than hang.
#[derive(Debug)]
pub struct OutboundQueue {
    queue: VecDeque<ClientEnvelope>,
    limit: usize,
}

impl OutboundQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Queue an envelope, returning the one evicted to make room, if any.
    pub fn push(&mut self, envelope: ClientEnvelope) -> Option<ClientEnvelope> {
        let evicted = if self.queue.len() >= self.limit {
            let oldest = self.queue.pop_front();
            warn!(
                limit = self.limit,
                "Outbound queue full, dropping oldest envelope"
            );
            oldest
        } else {
            None
        };
        self.queue.push_back(envelope);
        evicted
    }

    /// Put an envelope back at the head after a failed write.
    pub fn requeue_front(&mut self, envelope: ClientEnvelope) {
        self.queue.push_front(envelope);
        if self.queue.len() > self.limit {
            self.queue.pop_back();
        }
    }

    pub fn pop_front(&mut self) -> Option<ClientEnvelope> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

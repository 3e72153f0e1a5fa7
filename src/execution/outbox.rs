use std::collections::VecDeque;

use crate::transport::OutboundMessage;

pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Bounded FIFO of requests waiting for an open, unthrottled transport
///
/// When full, the oldest queued request is dropped.
#[derive(Debug)]
pub struct Outbox {
    queue: VecDeque<OutboundMessage>,
    capacity: usize,
    dropped: u64,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_OUTBOX_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, message: OutboundMessage) {
        if self.queue.len() >= self.capacity {
            if let Some(old) = self.queue.pop_front() {
                self.dropped += 1;
                tracing::warn!(
                    "Outbox full ({}), dropping oldest request #{} ({})",
                    self.capacity,
                    old.req_id,
                    old.request.kind()
                );
            }
        }
        self.queue.push_back(message);
    }

    /// Queue ahead of everything else, keeping the given order
    pub fn push_front_all(&mut self, messages: Vec<OutboundMessage>) {
        for message in messages.into_iter().rev() {
            if self.queue.len() >= self.capacity {
                if let Some(old) = self.queue.pop_back() {
                    self.dropped += 1;
                    tracing::warn!(
                        "Outbox full ({}), dropping newest request #{} ({})",
                        self.capacity,
                        old.req_id,
                        old.request.kind()
                    );
                }
            }
            self.queue.push_front(message);
        }
    }

    pub fn front(&self) -> Option<&OutboundMessage> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.queue.pop_front()
    }

    /// Put back a message whose send failed
    pub fn requeue(&mut self, message: OutboundMessage) {
        self.queue.push_front(message);
    }

    pub fn retain(&mut self, keep: impl FnMut(&OutboundMessage) -> bool) {
        self.queue.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

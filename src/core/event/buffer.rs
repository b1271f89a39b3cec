// flagflux_rust/src/core/event/buffer.rs

use super::input::{InputEvent, OutboxEvent};
use super::summarizer::{EventSummarizer, EventSummary};

/// Snapshot handed to a flush worker. Ownership moves with it: once a worker
/// has accepted the payload, the buffer starts over with fresh containers.
#[derive(Debug)]
pub struct FlushPayload {
    pub events: Vec<OutboxEvent>,
    pub summary: EventSummary,
}

/// Dispatcher-owned holding area for events awaiting the next flush.
///
/// Bounded: events past `capacity` are counted and dropped, with one warning
/// per saturation episode.
#[derive(Debug)]
pub struct EventBuffer {
    capacity: usize,
    events: Vec<OutboxEvent>,
    summarizer: EventSummarizer,
    dropped_events: u64,
    exceeded_capacity: bool,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Vec::new(),
            summarizer: EventSummarizer::new(),
            dropped_events: 0,
            exceeded_capacity: false,
        }
    }

    pub fn add_event(&mut self, event: OutboxEvent) {
        if self.events.len() < self.capacity {
            self.events.push(event);
            self.exceeded_capacity = false;
        } else {
            self.dropped_events += 1;
            if !self.exceeded_capacity {
                self.exceeded_capacity = true;
                log::warn!(
                    "Exceeded event queue capacity; increase capacity to avoid dropping events"
                );
            }
        }
    }

    pub fn add_to_summary(&mut self, event: &InputEvent) {
        self.summarizer.summarize_event(event);
    }

    /// True when there is nothing to flush, neither events nor counters.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.summarizer.is_empty()
    }

    /// Move the pending events and summary out, leaving the buffer empty.
    pub fn take_payload(&mut self) -> FlushPayload {
        FlushPayload {
            events: std::mem::take(&mut self.events),
            summary: self.summarizer.snapshot(),
        }
    }

    /// Put back a payload whose flush submission was rejected, so the next
    /// flush retries it.
    pub fn restore(&mut self, payload: FlushPayload) {
        self.events = payload.events;
        self.summarizer.restore(payload.summary);
    }

    pub fn get_and_clear_dropped_count(&mut self) -> u64 {
        std::mem::take(&mut self.dropped_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::User;

    fn index_event(n: u64) -> OutboxEvent {
        OutboxEvent::Index {
            timestamp: n,
            user: User::with_key(format!("u{}", n)),
        }
    }

    #[test]
    fn drops_and_counts_past_capacity() {
        let mut buffer = EventBuffer::new(2);
        buffer.add_event(index_event(1));
        buffer.add_event(index_event(2));
        buffer.add_event(index_event(3));
        buffer.add_event(index_event(4));
        assert_eq!(buffer.get_and_clear_dropped_count(), 2);
        assert_eq!(buffer.get_and_clear_dropped_count(), 0);
        let payload = buffer.take_payload();
        assert_eq!(payload.events.len(), 2);
    }

    #[test]
    fn take_payload_empties_the_buffer() {
        let mut buffer = EventBuffer::new(10);
        buffer.add_event(index_event(1));
        assert!(!buffer.is_empty());
        let payload = buffer.take_payload();
        assert_eq!(payload.events.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn restore_brings_a_rejected_payload_back() {
        let mut buffer = EventBuffer::new(10);
        buffer.add_event(index_event(1));
        let payload = buffer.take_payload();
        assert!(buffer.is_empty());
        buffer.restore(payload);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.take_payload().events.len(), 1);
    }

    #[test]
    fn capacity_frees_up_after_a_flush() {
        let mut buffer = EventBuffer::new(1);
        buffer.add_event(index_event(1));
        buffer.add_event(index_event(2));
        assert_eq!(buffer.get_and_clear_dropped_count(), 1);
        let _ = buffer.take_payload();
        buffer.add_event(index_event(3));
        assert_eq!(buffer.get_and_clear_dropped_count(), 0);
        assert_eq!(buffer.take_payload().events.len(), 1);
    }
}

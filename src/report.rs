//! The contract a report transport must satisfy.
//!
//! This crate guarantees that anything handed to a [`ReportChannel`] is
//! fully validated and immutable at hand-off time; delivery, batching, and
//! retries are entirely the channel's concern.

use std::sync::{Arc, Mutex};

use crate::event::Event;
use crate::span::SpanRecord;

/// Which collector channel an event is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Regular trace events.
    Event,
    /// Status messages, e.g. the init message.
    Status,
}

/// Which span pipeline a record is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanChannel {
    /// HTTP transaction spans.
    Http,
    /// All other spans.
    NonHttp,
}

/// Accepts finished events and spans for transmission.
///
/// Implemented by the external transport; this crate only defines the
/// contract. `send_event` returns a transport status code (0 on success);
/// `send_span` returns the transaction name actually used so upstream code
/// can correlate aggregation buckets.
pub trait ReportChannel: Send + Sync + std::fmt::Debug {
    /// Send a finished event on the given channel, returning a status code.
    fn send_event(&self, event: &Event, kind: ChannelKind) -> i32;

    /// Send a finalized span record, returning the transaction name used.
    fn send_span(&self, record: &SpanRecord, kind: SpanChannel) -> String;
}

/// A report channel that stores everything it is handed in memory.
///
/// Useful for testing and debugging. Sent events and spans can be
/// retrieved with [`finished_events`](Self::finished_events) and
/// [`finished_spans`](Self::finished_spans).
#[derive(Clone, Debug, Default)]
pub struct InMemoryReportChannel {
    events: Arc<Mutex<Vec<(Event, ChannelKind)>>>,
    spans: Arc<Mutex<Vec<(SpanRecord, SpanChannel)>>>,
}

impl InMemoryReportChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        InMemoryReportChannel::default()
    }

    /// Events sent so far, in order.
    pub fn finished_events(&self) -> Vec<(Event, ChannelKind)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Span records sent so far, in order.
    pub fn finished_spans(&self) -> Vec<(SpanRecord, SpanChannel)> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    /// Clear all stored events and spans.
    pub fn reset(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }
}

impl ReportChannel for InMemoryReportChannel {
    fn send_event(&self, event: &Event, kind: ChannelKind) -> i32 {
        match self.events.lock() {
            Ok(mut events) => {
                events.push((event.clone(), kind));
                0
            }
            Err(_) => -1,
        }
    }

    fn send_span(&self, record: &SpanRecord, kind: SpanChannel) -> String {
        let name = record.transaction_name().to_owned();
        if let Ok(mut spans) = self.spans.lock() {
            spans.push((record.clone(), kind));
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use crate::span::SpanInput;

    #[test]
    fn in_memory_channel_stores_events_in_order() {
        let channel = InMemoryReportChannel::new();
        let builder = EventBuilder::default();
        let ctx = builder.new_context(true);

        let first = builder.event(&ctx).unwrap();
        let second = builder.event(&first).unwrap();

        assert_eq!(channel.send_event(&first, ChannelKind::Status), 0);
        assert_eq!(channel.send_event(&second, ChannelKind::Event), 0);

        let finished = channel.finished_events();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].1, ChannelKind::Status);
        assert_eq!(finished[1].0, second);
    }

    #[test]
    fn send_span_returns_name_used() {
        let channel = InMemoryReportChannel::new();
        let record = SpanInput::new("n".repeat(400), 10).finalize().unwrap();

        let name = channel.send_span(&record, SpanChannel::Http);
        assert_eq!(name.len(), 255);
        assert_eq!(channel.finished_spans().len(), 1);
    }

    #[test]
    fn reset_clears_storage() {
        let channel = InMemoryReportChannel::new();
        let record = SpanInput::new("tx", 10).finalize().unwrap();
        channel.send_span(&record, SpanChannel::NonHttp);
        channel.reset();
        assert!(channel.finished_spans().is_empty());
    }
}

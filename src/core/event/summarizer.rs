// flagflux_rust/src/core/event/summarizer.rs

use super::input::{EvalEventData, InputEvent};
use indexmap::IndexMap;
use serde_json::Value;

/// Identity of one counter: flag key, variation index, flag version. The
/// optional parts are `None` when the flag was unknown at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub key: String,
    pub variation: Option<usize>,
    pub version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCounter {
    pub default: Value,
    pub value: Value,
    pub count: u64,
}

/// Aggregated view of the eval events seen since the last flush.
///
/// Counters keep insertion order so the serialized summary is stable for a
/// given event sequence. `start_date`/`end_date` bound the contributing
/// event timestamps; zero means no event has been counted yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub counters: IndexMap<CounterKey, SummaryCounter>,
    pub start_date: u64,
    pub end_date: u64,
}

impl EventSummary {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// Collapses eval events into per-(flag, version, variation) counters.
#[derive(Debug, Default)]
pub struct EventSummarizer {
    summary: EventSummary,
}

impl EventSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an event. Non-eval events are ignored.
    pub fn summarize_event(&mut self, event: &InputEvent) {
        if let InputEvent::Eval(e) = event {
            self.count_eval(e);
        }
    }

    fn count_eval(&mut self, event: &EvalEventData) {
        let key = CounterKey {
            key: event.key.clone(),
            variation: event.variation,
            version: event.version,
        };
        let counter = self
            .summary
            .counters
            .entry(key)
            .or_insert_with(|| SummaryCounter {
                default: event.default.clone(),
                value: event.value.clone(),
                count: 0,
            });
        counter.count += 1;

        let time = event.timestamp;
        if self.summary.start_date == 0 || time < self.summary.start_date {
            self.summary.start_date = time;
        }
        if time > self.summary.end_date {
            self.summary.end_date = time;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Hand the current summary to the caller and start a fresh one.
    pub fn snapshot(&mut self) -> EventSummary {
        std::mem::take(&mut self.summary)
    }

    /// Put back a summary whose flush submission was rejected.
    pub fn restore(&mut self, summary: EventSummary) {
        self.summary = summary;
    }
}

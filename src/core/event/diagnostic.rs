// flagflux_rust/src/core/event/diagnostic.rs

use crate::core::config::EventsConfig;
use crate::core::util::current_time_millis;
use serde_json::{json, Value};
use std::sync::Mutex;
use uuid::Uuid;

/// Accumulates diagnostic state between periodic diagnostic events.
///
/// One accumulator exists per SDK client; the event dispatcher drains it on
/// the diagnostic timer, and the streaming layer reports connection attempts
/// into it.
pub struct DiagnosticAccumulator {
    id: Value,
    state: Mutex<DiagnosticState>,
}

#[derive(Debug, Default)]
struct DiagnosticState {
    data_since_date: u64,
    stream_inits: Vec<Value>,
}

impl DiagnosticAccumulator {
    pub fn new(sdk_key: &str) -> Self {
        // Only the key suffix goes out, enough to tell environments apart.
        let chars: Vec<char> = sdk_key.chars().collect();
        let suffix: String = if chars.len() > 6 {
            chars[chars.len() - 6..].iter().collect()
        } else {
            sdk_key.to_string()
        };
        Self {
            id: json!({
                "diagnosticId": Uuid::new_v4().to_string(),
                "sdkKeySuffix": suffix,
            }),
            state: Mutex::new(DiagnosticState {
                data_since_date: current_time_millis(),
                stream_inits: Vec::new(),
            }),
        }
    }

    /// One-time event describing the configuration, sent when the pipeline
    /// starts.
    pub fn create_init_event(&self, config: &EventsConfig) -> Value {
        json!({
            "kind": "diagnostic-init",
            "creationDate": current_time_millis(),
            "id": self.id,
            "configuration": {
                "eventsCapacity": config.effective_capacity(),
                "eventsFlushIntervalMillis": config.flush_interval.as_millis() as u64,
                "userKeysCapacity": config.user_keys_capacity,
                "userKeysFlushIntervalMillis": config.user_keys_flush_interval.as_millis() as u64,
                "diagnosticRecordingIntervalMillis":
                    config.effective_diagnostic_recording_interval().as_millis() as u64,
                "inlineUsersInEvents": config.inline_users_in_events,
                "allAttributesPrivate": config.all_attributes_private,
            },
            "sdk": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "platform": {
                "name": "rust",
                "osName": std::env::consts::OS,
                "osArch": std::env::consts::ARCH,
            },
        })
    }

    /// Record one attempt to establish the streaming connection.
    pub fn record_stream_init(&self, timestamp: u64, duration_millis: u64, failed: bool) {
        let mut state = self.state.lock().expect("diagnostic mutex poisoned");
        state.stream_inits.push(json!({
            "timestamp": timestamp,
            "durationMillis": duration_millis,
            "failed": failed,
        }));
    }

    /// Periodic counters event; resets the accumulation window.
    pub fn create_periodic_event_and_reset(
        &self,
        dropped_events: u64,
        deduplicated_users: u64,
        events_in_last_batch: u64,
    ) -> Value {
        let now = current_time_millis();
        let mut state = self.state.lock().expect("diagnostic mutex poisoned");
        let event = json!({
            "kind": "diagnostic",
            "creationDate": now,
            "id": self.id,
            "dataSinceDate": state.data_since_date,
            "droppedEvents": dropped_events,
            "deduplicatedUsers": deduplicated_users,
            "eventsInLastBatch": events_in_last_batch,
            "streamInits": std::mem::take(&mut state.stream_inits),
        });
        state.data_since_date = now;
        event
    }
}

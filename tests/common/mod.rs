#![allow(dead_code)]

use crossbeam_channel::Receiver;
use flagflux_rust::core::config::{EventsConfig, EventsConfigBuilder};
use flagflux_rust::core::event::processor::EventProcessor;
use flagflux_rust::core::event::sender::{EventSender, EventSenderResult};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One payload as received by the fake sender, already parsed.
#[derive(Debug, Clone)]
pub struct CapturedPayload {
    pub body: Value,
    pub is_diagnostic: bool,
}

/// Test double for the event sender: records every payload and returns a
/// configurable result. With a gate installed, sends block until the gate
/// channel is closed, which lets tests tie up flush workers on demand.
pub struct CapturingSender {
    payloads: Mutex<Vec<CapturedPayload>>,
    result: Mutex<EventSenderResult>,
    gate: Mutex<Option<Receiver<()>>>,
    stop_calls: AtomicUsize,
}

impl CapturingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(Vec::new()),
            result: Mutex::new(EventSenderResult {
                success: true,
                must_shutdown: false,
                time_from_server_ms: None,
            }),
            gate: Mutex::new(None),
            stop_calls: AtomicUsize::new(0),
        })
    }

    /// A sender whose sends block until `gate_tx` is dropped.
    pub fn gated() -> (Arc<Self>, crossbeam_channel::Sender<()>) {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let sender = Self::new();
        *sender.gate.lock().unwrap() = Some(gate_rx);
        (sender, gate_tx)
    }

    pub fn set_result(&self, result: EventSenderResult) {
        *self.result.lock().unwrap() = result;
    }

    pub fn payloads(&self) -> Vec<CapturedPayload> {
        self.payloads.lock().unwrap().clone()
    }

    /// Bodies of the non-diagnostic payloads, in arrival order.
    pub fn event_payloads(&self) -> Vec<Value> {
        self.payloads()
            .into_iter()
            .filter(|p| !p.is_diagnostic)
            .map(|p| p.body)
            .collect()
    }

    pub fn diagnostic_payloads(&self) -> Vec<Value> {
        self.payloads()
            .into_iter()
            .filter(|p| p.is_diagnostic)
            .map(|p| p.body)
            .collect()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl EventSender for CapturingSender {
    fn send_event_data(&self, body: &str, _description: &str, is_diagnostic: bool) -> EventSenderResult {
        {
            let gate = self.gate.lock().unwrap();
            if let Some(rx) = &*gate {
                // Blocks until the test releases the gate by dropping the
                // sender side; the error after that is the release signal.
                let _ = rx.recv();
            }
        }
        self.payloads.lock().unwrap().push(CapturedPayload {
            body: serde_json::from_str(body).expect("sender received invalid JSON"),
            is_diagnostic,
        });
        self.result.lock().unwrap().clone()
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration with timers effectively disabled so tests drive the
/// pipeline explicitly through flush() and wait_until_inactive().
pub fn quiet_config() -> EventsConfigBuilder {
    EventsConfigBuilder::new()
        .with_flush_interval(Duration::from_secs(3600))
        .with_user_keys_flush_interval(Duration::from_secs(3600))
}

pub fn new_processor(config: EventsConfig, sender: Arc<CapturingSender>) -> EventProcessor {
    EventProcessor::new(&config, sender, None)
}

/// Events of one kind within a single flush payload.
pub fn events_of_kind(payload: &Value, kind: &str) -> Vec<Value> {
    payload
        .as_array()
        .expect("payload is not an array")
        .iter()
        .filter(|e| e["kind"] == kind)
        .cloned()
        .collect()
}

/// Spin until the sender has received at least `count` event payloads.
pub fn await_payloads(sender: &CapturingSender, count: usize) {
    for _ in 0..200 {
        if sender.event_payloads().len() >= count {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!(
        "expected at least {} payloads, got {}",
        count,
        sender.event_payloads().len()
    );
}

// flagflux_rust/src/core/event/dispatcher.rs

use super::buffer::{EventBuffer, FlushPayload};
use super::diagnostic::DiagnosticAccumulator;
use super::formatter::EventOutputFormatter;
use super::input::{EvalEventData, InputEvent, OutboxEvent};
use super::sender::EventSender;
use crate::core::config::EventsConfig;
use crate::core::exception::FlagfluxResult;
use crate::core::model::User;
use crate::core::util::{current_time_millis, LruKeySet, WorkerPool};
use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Messages understood by the dispatcher loop.
pub(crate) enum EventMessage {
    Event(InputEvent),
    Flush,
    FlushUsers,
    Diagnostic,
    /// Test hook: reply once all flush workers are idle.
    TestSync(Sender<()>),
    /// Shut worker pools down, reply, and exit the loop.
    Stop(Sender<()>),
}

const FLUSH_WORKER_COUNT: usize = 5;

/// Single consumer of the inbox. Owns all mutable pipeline state, so the
/// summarizer, buffer and LRU need no locking; only the `disabled` flag and
/// the last known server time are shared with the flush workers.
pub(crate) struct EventDispatcher {
    buffer: EventBuffer,
    user_keys: LruKeySet,
    deduplicated_users: u64,
    events_in_last_batch: u64,
    inline_users_in_events: bool,
    disabled: Arc<AtomicBool>,
    last_known_past_time: Arc<AtomicU64>,
    flush_workers: WorkerPool<FlushPayload>,
    diagnostic_workers: Option<WorkerPool<Value>>,
    diagnostic_accumulator: Option<Arc<DiagnosticAccumulator>>,
    sender: Arc<dyn EventSender>,
}

impl EventDispatcher {
    /// Spawn the dispatcher thread consuming `inbox`.
    pub(crate) fn start(
        config: &EventsConfig,
        sender: Arc<dyn EventSender>,
        diagnostic_accumulator: Option<Arc<DiagnosticAccumulator>>,
        inbox: Receiver<EventMessage>,
    ) -> JoinHandle<()> {
        let disabled = Arc::new(AtomicBool::new(false));
        let last_known_past_time = Arc::new(AtomicU64::new(0));
        let formatter = Arc::new(EventOutputFormatter::new(config));

        let flush_workers = {
            let formatter = Arc::clone(&formatter);
            let sender = Arc::clone(&sender);
            let disabled = Arc::clone(&disabled);
            let last_known_past_time = Arc::clone(&last_known_past_time);
            WorkerPool::new(
                "event-flush-worker",
                FLUSH_WORKER_COUNT,
                move |payload: FlushPayload| {
                    if let Err(e) =
                        deliver_payload(&formatter, sender.as_ref(), &disabled, &last_known_past_time, payload)
                    {
                        log::error!("Unexpected error while flushing events: {}", e);
                    }
                },
            )
        };

        // Diagnostics get a single dedicated worker so a slow diagnostic
        // send cannot occupy event-flush capacity.
        let diagnostic_workers = diagnostic_accumulator.as_ref().map(|_| {
            let sender = Arc::clone(&sender);
            WorkerPool::new("diagnostic-event-worker", 1, move |event: Value| {
                match serde_json::to_string(&event) {
                    Ok(body) => {
                        let _ = sender.send_event_data(&body, "diagnostic event", true);
                    }
                    Err(e) => log::error!("Failed to serialize diagnostic event: {}", e),
                }
            })
        });

        let dispatcher = EventDispatcher {
            buffer: EventBuffer::new(config.effective_capacity()),
            user_keys: LruKeySet::new(config.user_keys_capacity),
            deduplicated_users: 0,
            events_in_last_batch: 0,
            inline_users_in_events: config.inline_users_in_events,
            disabled,
            last_known_past_time,
            flush_workers,
            diagnostic_workers,
            diagnostic_accumulator,
            sender,
        };

        // Initial diagnostic event describing the configuration.
        if let (Some(accumulator), Some(pool)) = (
            &dispatcher.diagnostic_accumulator,
            &dispatcher.diagnostic_workers,
        ) {
            let _ = pool.post(accumulator.create_init_event(config));
        }

        thread::Builder::new()
            .name("event-dispatcher".to_string())
            .spawn(move || dispatcher.run(inbox))
            .expect("failed to spawn event dispatcher thread")
    }

    fn run(mut self, inbox: Receiver<EventMessage>) {
        while let Ok(message) = inbox.recv() {
            match message {
                EventMessage::Event(event) => self.dispatch_event(event),
                EventMessage::Flush => self.trigger_flush(),
                EventMessage::FlushUsers => self.user_keys.clear(),
                EventMessage::Diagnostic => self.trigger_diagnostic(),
                EventMessage::TestSync(reply) => {
                    self.flush_workers.wait_until_idle();
                    if let Some(pool) = &self.diagnostic_workers {
                        pool.wait_until_idle();
                    }
                    let _ = reply.send(());
                }
                EventMessage::Stop(reply) => {
                    self.shut_down();
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }

    fn dispatch_event(&mut self, event: InputEvent) {
        if self.disabled.load(Ordering::SeqCst) {
            return;
        }
        // Every eval event feeds the summary, tracked or not.
        self.buffer.add_to_summary(&event);

        let mut debug_event = None;
        let will_add_full_event = match &event {
            InputEvent::Eval(e) => {
                if self.should_debug_event(e) {
                    debug_event = Some(e.clone());
                }
                e.track_events
            }
            _ => true,
        };

        // Every user is noticed, whatever the event kind; the window must
        // remember users whose full event carried them, or a later non-full
        // event for the same user would index them again. An index event is
        // emitted only for a first sighting that no full user payload in
        // this batch already covers: not for identifies, and not when the
        // full event inlines the user.
        if let Some(user) = event.user() {
            let known = self.notice_user(user);
            let user_already_carried = matches!(event, InputEvent::Identify(_))
                || (will_add_full_event && self.inline_users_in_events);
            if !known && !user_already_carried {
                self.buffer.add_event(OutboxEvent::Index {
                    timestamp: event.timestamp(),
                    user: user.clone(),
                });
            }
        }

        if will_add_full_event {
            self.buffer.add_event(OutboxEvent::Full(event));
        }
        if let Some(debug) = debug_event {
            self.buffer.add_event(OutboxEvent::Debug(debug));
        }
    }

    /// Remember the user's key; true means we had seen it recently.
    fn notice_user(&mut self, user: &User) -> bool {
        match user.key() {
            None => true,
            Some(key) => {
                let known = self.user_keys.notice(key);
                if known {
                    self.deduplicated_users += 1;
                }
                known
            }
        }
    }

    fn should_debug_event(&self, event: &EvalEventData) -> bool {
        match event.debug_until {
            None => false,
            Some(debug_until) => {
                // The window must be in the future by both the server clock
                // (as last reported to us) and our own.
                let last_past = self.last_known_past_time.load(Ordering::SeqCst);
                debug_until > last_past && debug_until > current_time_millis()
            }
        }
    }

    fn trigger_flush(&mut self) {
        if self.disabled.load(Ordering::SeqCst) {
            return;
        }
        if self.buffer.is_empty() {
            self.events_in_last_batch = 0;
            return;
        }
        let payload = self.buffer.take_payload();
        self.events_in_last_batch =
            payload.events.len() as u64 + if payload.summary.is_empty() { 0 } else { 1 };
        if let Err(payload) = self.flush_workers.post(payload) {
            // Every worker is tied up in a send; keep the data so the next
            // flush retries it.
            self.buffer.restore(payload);
        }
    }

    fn trigger_diagnostic(&mut self) {
        if self.disabled.load(Ordering::SeqCst) {
            return;
        }
        let accumulator = match &self.diagnostic_accumulator {
            Some(accumulator) => accumulator,
            None => return,
        };
        let pool = match &self.diagnostic_workers {
            Some(pool) => pool,
            None => return,
        };
        let dropped = self.buffer.get_and_clear_dropped_count();
        let event = accumulator.create_periodic_event_and_reset(
            dropped,
            self.deduplicated_users,
            self.events_in_last_batch,
        );
        self.deduplicated_users = 0;
        self.events_in_last_batch = 0;
        if pool.post(event).is_err() {
            log::warn!("Skipped a diagnostic event because the previous one is still in flight");
        }
    }

    fn shut_down(&mut self) {
        self.flush_workers.shutdown();
        if let Some(pool) = &mut self.diagnostic_workers {
            pool.shutdown();
        }
        self.sender.stop();
    }
}

fn deliver_payload(
    formatter: &EventOutputFormatter,
    sender: &dyn EventSender,
    disabled: &AtomicBool,
    last_known_past_time: &AtomicU64,
    payload: FlushPayload,
) -> FlagfluxResult<()> {
    let output = formatter.make_output_events(&payload.events, &payload.summary);
    if output.is_empty() {
        return Ok(());
    }
    let body = serde_json::to_string(&output)?;
    let description = format!("{} events", output.len());
    let result = sender.send_event_data(&body, &description, false);
    if result.must_shutdown {
        disabled.store(true, Ordering::SeqCst);
    }
    if let Some(server_time) = result.time_from_server_ms {
        // Monotonic so overlapping flushes cannot move the clock backwards.
        last_known_past_time.fetch_max(server_time, Ordering::SeqCst);
    }
    Ok(())
}

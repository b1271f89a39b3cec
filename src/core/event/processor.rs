// flagflux_rust/src/core/event/processor.rs

use super::diagnostic::DiagnosticAccumulator;
use super::dispatcher::{EventDispatcher, EventMessage};
use super::input::{
    context_kind_for, AliasEventData, CustomEventData, EvalEventData, IdentifyEventData, InputEvent,
};
use super::sender::EventSender;
use crate::core::config::EventsConfig;
use crate::core::eval::EvaluationReason;
use crate::core::model::User;
use crate::core::util::{current_time_millis, RepeatingTask};
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Thread-safe front end of the analytics event pipeline.
///
/// Any number of producer threads may record events concurrently; recording
/// never blocks and never reports failure. When the inbox is saturated,
/// events are dropped and one warning per episode is logged. Only [`stop`]
/// blocks, to guarantee an orderly final flush.
///
/// [`stop`]: EventProcessor::stop
pub struct EventProcessor {
    inbox: InboxHandle,
    flush_task: RepeatingTask,
    user_keys_flush_task: RepeatingTask,
    diagnostic_task: Option<RepeatingTask>,
    stopped: AtomicBool,
    dispatcher_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Producer-side handle performing non-blocking posts into the inbox.
#[derive(Clone)]
struct InboxHandle {
    sender: Sender<EventMessage>,
    full: Arc<AtomicBool>,
}

impl InboxHandle {
    fn post(&self, message: EventMessage) {
        match self.sender.try_send(message) {
            Ok(()) => {
                self.full.store(false, Ordering::SeqCst);
            }
            Err(TrySendError::Full(_)) => {
                // Warn once per saturation episode, not per dropped event.
                if !self.full.swap(true, Ordering::SeqCst) {
                    log::warn!(
                        "Events are being produced faster than they can be processed; some events will be dropped"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl EventProcessor {
    pub fn new(
        config: &EventsConfig,
        sender: Arc<dyn EventSender>,
        diagnostic_accumulator: Option<Arc<DiagnosticAccumulator>>,
    ) -> Self {
        let diagnostic_accumulator = if config.diagnostic_opt_out {
            None
        } else {
            diagnostic_accumulator
        };
        let (inbox_tx, inbox_rx) = bounded(config.effective_capacity());
        let dispatcher_handle =
            EventDispatcher::start(config, sender, diagnostic_accumulator.clone(), inbox_rx);
        let inbox = InboxHandle {
            sender: inbox_tx,
            full: Arc::new(AtomicBool::new(false)),
        };

        let flush_task = {
            let inbox = inbox.clone();
            RepeatingTask::start("event-flush-timer", config.flush_interval, move || {
                inbox.post(EventMessage::Flush)
            })
        };
        let user_keys_flush_task = {
            let inbox = inbox.clone();
            RepeatingTask::start(
                "user-keys-flush-timer",
                config.user_keys_flush_interval,
                move || inbox.post(EventMessage::FlushUsers),
            )
        };
        let diagnostic_task = diagnostic_accumulator.as_ref().map(|_| {
            let inbox = inbox.clone();
            RepeatingTask::start(
                "diagnostic-event-timer",
                config.effective_diagnostic_recording_interval(),
                move || inbox.post(EventMessage::Diagnostic),
            )
        });

        Self {
            inbox,
            flush_task,
            user_keys_flush_task,
            diagnostic_task,
            stopped: AtomicBool::new(false),
            dispatcher_handle: Mutex::new(Some(dispatcher_handle)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_eval_event(
        &self,
        user: User,
        key: impl Into<String>,
        version: Option<u64>,
        variation: Option<usize>,
        value: Value,
        reason: Option<EvaluationReason>,
        default: Value,
        track_events: bool,
        debug_until: Option<u64>,
        prereq_of: Option<String>,
    ) {
        self.inbox.post(EventMessage::Event(InputEvent::Eval(EvalEventData {
            timestamp: current_time_millis(),
            user,
            key: key.into(),
            version,
            variation,
            value,
            reason,
            default,
            track_events,
            debug_until,
            prereq_of,
        })));
    }

    pub fn record_identify_event(&self, user: User) {
        self.inbox
            .post(EventMessage::Event(InputEvent::Identify(IdentifyEventData {
                timestamp: current_time_millis(),
                user,
            })));
    }

    pub fn record_custom_event(
        &self,
        user: User,
        key: impl Into<String>,
        data: Option<Value>,
        metric_value: Option<f64>,
    ) {
        self.inbox
            .post(EventMessage::Event(InputEvent::Custom(CustomEventData {
                timestamp: current_time_millis(),
                user,
                key: key.into(),
                data,
                metric_value,
            })));
    }

    /// Record that `previous_user` is now known as `user`.
    pub fn record_alias_event(&self, user: &User, previous_user: &User) {
        self.inbox
            .post(EventMessage::Event(InputEvent::Alias(AliasEventData {
                timestamp: current_time_millis(),
                key: user.key.clone().unwrap_or_default(),
                context_kind: context_kind_for(user),
                previous_key: previous_user.key.clone().unwrap_or_default(),
                previous_context_kind: context_kind_for(previous_user),
            })));
    }

    /// Ask for an immediate flush; returns without waiting for delivery.
    pub fn flush(&self) {
        self.inbox.post(EventMessage::Flush);
    }

    /// Test hook: block until the dispatcher has drained the inbox up to
    /// this point and every flush worker is idle again.
    pub fn wait_until_inactive(&self) {
        let (reply_tx, reply_rx) = bounded(1);
        if self
            .inbox
            .sender
            .send(EventMessage::TestSync(reply_tx))
            .is_ok()
        {
            let _ = reply_rx.recv();
        }
    }

    /// Flush remaining events and shut the pipeline down. Idempotent; blocks
    /// until the dispatcher acknowledges the stop.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flush_task.stop();
        self.user_keys_flush_task.stop();
        if let Some(task) = &self.diagnostic_task {
            task.stop();
        }
        // These two must arrive even when the inbox is saturated, so they
        // use blocking sends; an orderly shutdown depends on them.
        let _ = self.inbox.sender.send(EventMessage::Flush);
        let (reply_tx, reply_rx) = bounded(1);
        if self.inbox.sender.send(EventMessage::Stop(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
        if let Some(handle) = self
            .dispatcher_handle
            .lock()
            .expect("dispatcher handle mutex poisoned")
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for EventProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

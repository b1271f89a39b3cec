// flagflux_rust/src/core/event/input.rs

use crate::core::eval::EvaluationReason;
use crate::core::model::User;
use serde_json::Value;

/// Wire value distinguishing anonymous users from known users.
pub fn context_kind_for(user: &User) -> &'static str {
    if user.anonymous == Some(true) {
        "anonymousUser"
    } else {
        "user"
    }
}

/// An event recorded by the application-facing side of the SDK.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Eval(EvalEventData),
    Identify(IdentifyEventData),
    Custom(CustomEventData),
    Alias(AliasEventData),
}

impl InputEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            InputEvent::Eval(e) => e.timestamp,
            InputEvent::Identify(e) => e.timestamp,
            InputEvent::Custom(e) => e.timestamp,
            InputEvent::Alias(e) => e.timestamp,
        }
    }

    /// The user the event is about; alias events carry only keys.
    pub fn user(&self) -> Option<&User> {
        match self {
            InputEvent::Eval(e) => Some(&e.user),
            InputEvent::Identify(e) => Some(&e.user),
            InputEvent::Custom(e) => Some(&e.user),
            InputEvent::Alias(_) => None,
        }
    }
}

/// One flag evaluation. Most of these only ever feed the summary; a full
/// event is emitted when `track_events` is set, and a debug copy while
/// `debug_until` lies in the future.
#[derive(Debug, Clone)]
pub struct EvalEventData {
    pub timestamp: u64,
    pub user: User,
    pub key: String,
    pub version: Option<u64>,
    pub variation: Option<usize>,
    pub value: Value,
    pub default: Value,
    pub reason: Option<EvaluationReason>,
    pub track_events: bool,
    pub debug_until: Option<u64>,
    pub prereq_of: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentifyEventData {
    pub timestamp: u64,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct CustomEventData {
    pub timestamp: u64,
    pub user: User,
    pub key: String,
    pub data: Option<Value>,
    pub metric_value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AliasEventData {
    pub timestamp: u64,
    pub key: String,
    pub context_kind: &'static str,
    pub previous_key: String,
    pub previous_context_kind: &'static str,
}

/// Events as queued for delivery, including the synthetic kinds the
/// dispatcher emits alongside recorded events.
#[derive(Debug, Clone)]
pub enum OutboxEvent {
    Full(InputEvent),
    Index { timestamp: u64, user: User },
    Debug(EvalEventData),
}

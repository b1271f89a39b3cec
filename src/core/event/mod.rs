// flagflux_rust/src/core/event/mod.rs

pub mod buffer;
pub mod diagnostic;
pub(crate) mod dispatcher;
pub mod formatter;
pub mod input;
pub mod processor;
pub mod sender;
pub mod summarizer;
pub mod user_filter;

pub use self::buffer::{EventBuffer, FlushPayload};
pub use self::diagnostic::DiagnosticAccumulator;
pub use self::formatter::EventOutputFormatter;
pub use self::input::{
    context_kind_for, AliasEventData, CustomEventData, EvalEventData, IdentifyEventData,
    InputEvent, OutboxEvent,
};
pub use self::processor::EventProcessor;
pub use self::sender::{is_http_error_recoverable, EventSender, EventSenderResult, HttpEventSender};
pub use self::summarizer::{CounterKey, EventSummarizer, EventSummary, SummaryCounter};
pub use self::user_filter::UserFilter;

// flagflux_rust/src/core/config/mod.rs

use std::time::Duration;

/// Floor applied to the inbox and output buffer capacity.
pub const MIN_EVENT_CAPACITY: usize = 100;
/// Floor applied to the diagnostic recording interval.
pub const MIN_DIAGNOSTIC_RECORDING_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_USER_KEYS_CAPACITY: usize = 1000;
pub const DEFAULT_USER_KEYS_FLUSH_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_DIAGNOSTIC_RECORDING_INTERVAL: Duration = Duration::from_secs(900);
pub const DEFAULT_EVENTS_URI: &str = "https://events.flagflux.io";

/// Configuration of the analytics event pipeline.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// Maximum events held in the inbox and in the output buffer. Values
    /// below [`MIN_EVENT_CAPACITY`] are raised to that floor.
    pub capacity: usize,
    /// How often buffered events are flushed to the ingestion endpoint.
    pub flush_interval: Duration,
    /// Size of the recently-seen-user-keys window.
    pub user_keys_capacity: usize,
    /// How often the user-key window is cleared.
    pub user_keys_flush_interval: Duration,
    /// How often periodic diagnostic events are emitted.
    pub diagnostic_recording_interval: Duration,
    /// Disables diagnostics even when an accumulator is supplied.
    pub diagnostic_opt_out: bool,
    /// Serialize full user objects into feature/custom events instead of
    /// bare user keys.
    pub inline_users_in_events: bool,
    /// Base URL of the ingestion service.
    pub events_uri: String,
    /// Redact every user attribute except key and anonymous.
    pub all_attributes_private: bool,
    /// Attribute names redacted for every user.
    pub private_attribute_names: Vec<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            user_keys_capacity: DEFAULT_USER_KEYS_CAPACITY,
            user_keys_flush_interval: DEFAULT_USER_KEYS_FLUSH_INTERVAL,
            diagnostic_recording_interval: DEFAULT_DIAGNOSTIC_RECORDING_INTERVAL,
            diagnostic_opt_out: false,
            inline_users_in_events: false,
            events_uri: DEFAULT_EVENTS_URI.to_string(),
            all_attributes_private: false,
            private_attribute_names: Vec::new(),
        }
    }
}

impl EventsConfig {
    /// Capacity with the configured floor applied.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(MIN_EVENT_CAPACITY)
    }

    pub fn effective_diagnostic_recording_interval(&self) -> Duration {
        self.diagnostic_recording_interval
            .max(MIN_DIAGNOSTIC_RECORDING_INTERVAL)
    }

    /// Endpoint for bulk event payloads.
    pub fn bulk_uri(&self) -> String {
        format!("{}/bulk", self.events_uri.trim_end_matches('/'))
    }

    /// Endpoint for diagnostic payloads.
    pub fn diagnostic_uri(&self) -> String {
        format!("{}/diagnostic", self.events_uri.trim_end_matches('/'))
    }
}

/// Builder for [`EventsConfig`] with fluent setters.
#[derive(Debug, Clone, Default)]
pub struct EventsConfigBuilder {
    config: EventsConfig,
}

impl EventsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn with_user_keys_capacity(mut self, capacity: usize) -> Self {
        self.config.user_keys_capacity = capacity;
        self
    }

    pub fn with_user_keys_flush_interval(mut self, interval: Duration) -> Self {
        self.config.user_keys_flush_interval = interval;
        self
    }

    pub fn with_diagnostic_recording_interval(mut self, interval: Duration) -> Self {
        self.config.diagnostic_recording_interval = interval;
        self
    }

    pub fn with_diagnostic_opt_out(mut self, opt_out: bool) -> Self {
        self.config.diagnostic_opt_out = opt_out;
        self
    }

    pub fn with_inline_users_in_events(mut self, inline: bool) -> Self {
        self.config.inline_users_in_events = inline;
        self
    }

    pub fn with_events_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.events_uri = uri.into();
        self
    }

    pub fn with_all_attributes_private(mut self, private: bool) -> Self {
        self.config.all_attributes_private = private;
        self
    }

    pub fn with_private_attribute_names(mut self, names: Vec<String>) -> Self {
        self.config.private_attribute_names = names;
        self
    }

    pub fn build(self) -> EventsConfig {
        self.config
    }
}

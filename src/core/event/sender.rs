// flagflux_rust/src/core/event/sender.rs

use crate::core::config::EventsConfig;
use crate::core::exception::{FlagfluxError, FlagfluxResult};
use chrono::DateTime;
use std::time::Duration;
use uuid::Uuid;

const EVENT_SCHEMA_VERSION: &str = "3";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of delivering one payload to the ingestion endpoint.
#[derive(Debug, Clone, Default)]
pub struct EventSenderResult {
    pub success: bool,
    /// The service rejected our credentials; the pipeline must stop sending.
    pub must_shutdown: bool,
    /// Server wall clock in epoch ms, taken from the response Date header.
    pub time_from_server_ms: Option<u64>,
}

/// Delivers formatted event payloads. Implementations own all transport
/// details; the pipeline only looks at the returned result.
pub trait EventSender: Send + Sync {
    fn send_event_data(
        &self,
        body: &str,
        description: &str,
        is_diagnostic: bool,
    ) -> EventSenderResult;

    /// Called once while the dispatcher shuts down.
    fn stop(&self) {}
}

/// Default sender POSTing JSON payloads over HTTP, with one retry.
pub struct HttpEventSender {
    client: reqwest::blocking::Client,
    events_uri: String,
    diagnostic_uri: String,
    authorization: String,
}

impl HttpEventSender {
    pub fn new(sdk_key: &str, config: &EventsConfig) -> FlagfluxResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| FlagfluxError::Sender(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            events_uri: config.bulk_uri(),
            diagnostic_uri: config.diagnostic_uri(),
            authorization: sdk_key.to_string(),
        })
    }

    fn attempt_send(
        &self,
        uri: &str,
        body: &str,
        payload_id: Option<&str>,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let mut request = self
            .client
            .post(uri)
            .header("Content-Type", "application/json")
            .header("Authorization", &self.authorization)
            .header("X-Event-Schema-Version", EVENT_SCHEMA_VERSION)
            .body(body.to_string());
        if let Some(payload_id) = payload_id {
            request = request.header("X-Event-Payload-Id", payload_id);
        }
        request.send()
    }
}

impl EventSender for HttpEventSender {
    fn send_event_data(
        &self,
        body: &str,
        description: &str,
        is_diagnostic: bool,
    ) -> EventSenderResult {
        let uri = if is_diagnostic {
            &self.diagnostic_uri
        } else {
            &self.events_uri
        };
        // The payload id lets the service de-duplicate retried batches.
        let payload_id = if is_diagnostic {
            None
        } else {
            Some(Uuid::new_v4().to_string())
        };

        let mut result = EventSenderResult::default();
        for attempt in 0..2 {
            if attempt > 0 {
                log::warn!("Will retry posting {} after 1 second", description);
                std::thread::sleep(RETRY_DELAY);
            }
            let response = match self.attempt_send(uri, body, payload_id.as_deref()) {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Error posting {}: {}", description, e);
                    continue;
                }
            };
            let status = response.status();
            if status.is_success() {
                result.success = true;
                result.time_from_server_ms = response
                    .headers()
                    .get("date")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
                    .map(|date| date.timestamp_millis() as u64);
                return result;
            }
            log::error!(
                "HTTP error {} while posting {}",
                status.as_u16(),
                description
            );
            if !is_http_error_recoverable(status.as_u16()) {
                result.must_shutdown = true;
                return result;
            }
        }
        result
    }
}

/// Client errors other than these mean our request will never be accepted;
/// retrying cannot help and for auth failures the pipeline must shut down.
pub fn is_http_error_recoverable(status: u16) -> bool {
    if (400..500).contains(&status) {
        matches!(status, 400 | 408 | 429)
    } else {
        true
    }
}

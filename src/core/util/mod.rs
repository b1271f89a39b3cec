// flagflux_rust/src/core/util/mod.rs

pub mod lru_set;
pub mod scheduler;
pub mod worker_pool;

pub use self::lru_set::LruKeySet;
pub use self::scheduler::RepeatingTask;
pub use self::worker_pool::WorkerPool;

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// String form of a JSON value, without the quoting `to_string` would add
/// around strings. Non-scalar values fall back to their JSON text.
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

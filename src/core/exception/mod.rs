// SPDX-License-Identifier: MIT OR Apache-2.0

// flagflux_rust/src/core/exception/mod.rs

use thiserror::Error;

/// Result type for fallible pipeline operations.
pub type FlagfluxResult<T> = Result<T, FlagfluxError>;

/// Errors surfaced by the event pipeline's delivery path.
///
/// Producer-facing record operations never return these; a failed record is
/// a silent drop by design. Errors show up only when constructing senders or
/// inside flush workers, where they are logged and the batch is lost.
#[derive(Error, Debug)]
pub enum FlagfluxError {
    #[error("failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event sender error: {0}")]
    Sender(String),
}

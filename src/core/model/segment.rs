// flagflux_rust/src/core/model/segment.rs

use super::flag::Clause;
use serde::Deserialize;

/// A reusable set of users referenced from flag rules via `segmentMatch`.
///
/// Segments with `unbounded` set are big segments: their membership lives in
/// an external store queried per user, identified by key plus `generation`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    pub key: String,
    pub version: u64,
    pub included: Vec<String>,
    pub excluded: Vec<String>,
    pub salt: String,
    pub rules: Vec<SegmentRule>,
    pub unbounded: bool,
    pub generation: Option<i64>,
    pub deleted: bool,
}

/// A rule within a segment; all clauses must match, then the optional weight
/// takes a percentage slice of the matching users.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,
    pub weight: Option<i64>,
    pub bucket_by: Option<String>,
}

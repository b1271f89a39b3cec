// flagflux_rust/src/core/eval/operators.rs

use crate::core::model::Operator;
use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

/// Apply a clause operator to one user value and one clause value.
///
/// Type mismatches never error; an operator applied to values of the wrong
/// type simply does not match. `segmentMatch` is resolved by the evaluator,
/// not here.
pub fn apply(op: Operator, user_value: &Value, clause_value: &Value) -> bool {
    match op {
        Operator::In => values_equal(user_value, clause_value),
        Operator::StartsWith => string_op(user_value, clause_value, |a, b| a.starts_with(b)),
        Operator::EndsWith => string_op(user_value, clause_value, |a, b| a.ends_with(b)),
        Operator::Contains => string_op(user_value, clause_value, |a, b| a.contains(b)),
        Operator::Matches => match (user_value.as_str(), clause_value.as_str()) {
            (Some(text), Some(pattern)) => Regex::new(pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            _ => false,
        },
        Operator::LessThan => numeric_op(user_value, clause_value, |a, b| a < b),
        Operator::LessThanOrEqual => numeric_op(user_value, clause_value, |a, b| a <= b),
        Operator::GreaterThan => numeric_op(user_value, clause_value, |a, b| a > b),
        Operator::GreaterThanOrEqual => numeric_op(user_value, clause_value, |a, b| a >= b),
        Operator::Before => date_op(user_value, clause_value, |a, b| a < b),
        Operator::After => date_op(user_value, clause_value, |a, b| a > b),
        Operator::SegmentMatch | Operator::Unrecognized => false,
    }
}

/// Equality with numeric coercion, so 3 and 3.0 compare equal the way they
/// do in the flag authoring UI.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn string_op<F: Fn(&str, &str) -> bool>(a: &Value, b: &Value, f: F) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn numeric_op<F: Fn(f64, f64) -> bool>(a: &Value, b: &Value, f: F) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn date_op<F: Fn(f64, f64) -> bool>(a: &Value, b: &Value, f: F) -> bool {
    match (date_value_to_millis(a), date_value_to_millis(b)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// Timestamps in clauses are either epoch milliseconds or RFC 3339 strings.
fn date_value_to_millis(value: &Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis() as f64)
}

// flagflux_rust/src/core/eval/mod.rs

pub mod bucketing;
pub mod detail;
pub mod evaluator;
pub mod operators;

pub use self::detail::{
    BigSegmentsStatus, EvalErrorKind, EvaluationDetail, EvaluationReason, ReasonKind,
};
pub use self::evaluator::{BigSegmentsResult, EvalResult, Evaluator, PrerequisiteEvalRecord};

use crate::core::model::FeatureFlag;

/// Whether this evaluation outcome must be reported as a full event even if
/// the flag itself does not track events: experiment rollouts, tracked
/// rules, and tracked fallthroughs all require per-evaluation data.
pub fn reason_requires_tracking(flag: &FeatureFlag, reason: &EvaluationReason) -> bool {
    if reason.is_in_experiment() {
        return true;
    }
    match &reason.kind {
        ReasonKind::Fallthrough { .. } => flag.track_events_fallthrough,
        ReasonKind::RuleMatch { rule_index, .. } => flag
            .rules
            .get(*rule_index)
            .map_or(false, |rule| rule.track_events),
        _ => false,
    }
}

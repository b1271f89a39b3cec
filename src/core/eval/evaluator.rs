// flagflux_rust/src/core/eval/evaluator.rs

use super::bucketing;
use super::detail::{BigSegmentsStatus, EvalErrorKind, EvaluationDetail, EvaluationReason};
use super::operators;
use crate::core::model::{Clause, FeatureFlag, FlagRule, Operator, Segment, SegmentRule, User};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Membership and health reported by the external big-segment store for one
/// user. `membership` maps segment references (`"{key}.g{generation}"`) to
/// explicit inclusion or exclusion.
#[derive(Debug, Clone)]
pub struct BigSegmentsResult {
    pub membership: Option<HashMap<String, bool>>,
    pub status: BigSegmentsStatus,
}

/// One prerequisite evaluation performed on the way to a result, returned so
/// the caller can record it as an eval event of its own.
#[derive(Debug, Clone)]
pub struct PrerequisiteEvalRecord {
    pub prereq_flag: FeatureFlag,
    pub prereq_of_flag_key: String,
    pub detail: EvaluationDetail,
}

/// Everything produced by one call to [`Evaluator::evaluate`].
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub detail: EvaluationDetail,
    pub prereq_evals: Vec<PrerequisiteEvalRecord>,
    pub big_segments_status: Option<BigSegmentsStatus>,
    pub big_segments_membership: Option<HashMap<String, bool>>,
}

/// Pure flag evaluation against caller-supplied data lookups.
///
/// The evaluator performs no I/O of its own; flags, segments and big-segment
/// membership all come through the closures given at construction. Failures
/// are reported through error reasons on the returned detail, never panics.
pub struct Evaluator<'a> {
    get_flag: Box<dyn Fn(&str) -> Option<FeatureFlag> + 'a>,
    get_segment: Box<dyn Fn(&str) -> Option<Segment> + 'a>,
    get_big_segments_membership: Option<Box<dyn Fn(&str) -> Option<BigSegmentsResult> + 'a>>,
}

#[derive(Default)]
struct EvalState {
    prereq_evals: Vec<PrerequisiteEvalRecord>,
    big_segments_status: Option<BigSegmentsStatus>,
    big_segments_membership: Option<HashMap<String, bool>>,
    /// Flags on the current prerequisite chain, for cycle detection.
    visited: HashSet<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        get_flag: impl Fn(&str) -> Option<FeatureFlag> + 'a,
        get_segment: impl Fn(&str) -> Option<Segment> + 'a,
    ) -> Self {
        Self {
            get_flag: Box::new(get_flag),
            get_segment: Box::new(get_segment),
            get_big_segments_membership: None,
        }
    }

    pub fn with_big_segments(
        mut self,
        get_membership: impl Fn(&str) -> Option<BigSegmentsResult> + 'a,
    ) -> Self {
        self.get_big_segments_membership = Some(Box::new(get_membership));
        self
    }

    pub fn evaluate(&self, flag: &FeatureFlag, user: &User) -> EvalResult {
        let mut state = EvalState::default();
        let mut detail = if user.key().is_none() {
            EvaluationDetail::error(EvalErrorKind::UserNotSpecified)
        } else {
            state.visited.insert(flag.key.clone());
            self.eval_internal(flag, user, &mut state)
        };
        if let Some(status) = state.big_segments_status {
            detail.reason.set_big_segments_status(status);
        }
        EvalResult {
            detail,
            prereq_evals: state.prereq_evals,
            big_segments_status: state.big_segments_status,
            big_segments_membership: state.big_segments_membership,
        }
    }

    fn eval_internal(
        &self,
        flag: &FeatureFlag,
        user: &User,
        state: &mut EvalState,
    ) -> EvaluationDetail {
        if !flag.on {
            return off_value(flag, EvaluationReason::off());
        }

        if let Some(short_circuit) = self.check_prerequisites(flag, user, state) {
            return short_circuit;
        }

        if let Some(user_key) = user.key() {
            for target in &flag.targets {
                if target.values.iter().any(|value| value == user_key) {
                    return variation_value(flag, target.variation, EvaluationReason::target_match());
                }
            }
        }

        for (index, rule) in flag.rules.iter().enumerate() {
            if self.rule_matches_user(rule, user, state) {
                let (variation, in_experiment) = bucketing::variation_index_for_user(
                    &flag.key,
                    &flag.salt,
                    &rule.variation_or_rollout,
                    user,
                );
                let reason = EvaluationReason::rule_match(index, rule.id.clone(), in_experiment);
                return resolved_variation_value(flag, variation, reason);
            }
        }

        let (variation, in_experiment) =
            bucketing::variation_index_for_user(&flag.key, &flag.salt, &flag.fallthrough, user);
        resolved_variation_value(flag, variation, EvaluationReason::fallthrough(in_experiment))
    }

    /// Walk the prerequisite list in order, recording every evaluation.
    /// Returns the short-circuit detail on the first failure.
    fn check_prerequisites(
        &self,
        flag: &FeatureFlag,
        user: &User,
        state: &mut EvalState,
    ) -> Option<EvaluationDetail> {
        for prerequisite in &flag.prerequisites {
            let prereq_key = &prerequisite.key;
            if state.visited.contains(prereq_key) {
                log::error!(
                    "Prerequisite cycle detected between flags {} and {}; treating {} as malformed",
                    flag.key,
                    prereq_key,
                    flag.key
                );
                return Some(EvaluationDetail::error(EvalErrorKind::MalformedFlag));
            }
            let mut prereq_ok = false;
            match (self.get_flag)(prereq_key) {
                None => {
                    log::error!(
                        "Flag {} not found when evaluating prerequisite of {}",
                        prereq_key,
                        flag.key
                    );
                }
                Some(prereq_flag) => {
                    state.visited.insert(prereq_key.clone());
                    let detail = self.eval_internal(&prereq_flag, user, state);
                    state.visited.remove(prereq_key);
                    // An off prerequisite never matches, whatever its off
                    // variation produced; an error detail fails the index
                    // comparison on its own.
                    prereq_ok = prereq_flag.on
                        && detail.variation_index == Some(prerequisite.variation);
                    state.prereq_evals.push(PrerequisiteEvalRecord {
                        prereq_flag,
                        prereq_of_flag_key: flag.key.clone(),
                        detail,
                    });
                }
            }
            if !prereq_ok {
                return Some(off_value(
                    flag,
                    EvaluationReason::prerequisite_failed(prereq_key.clone()),
                ));
            }
        }
        None
    }

    fn rule_matches_user(&self, rule: &FlagRule, user: &User, state: &mut EvalState) -> bool {
        rule.clauses
            .iter()
            .all(|clause| self.clause_matches_user(clause, user, state))
    }

    fn clause_matches_user(&self, clause: &Clause, user: &User, state: &mut EvalState) -> bool {
        if clause.op == Operator::SegmentMatch {
            let matched = clause.values.iter().any(|value| {
                value.as_str().map_or(false, |segment_key| {
                    (self.get_segment)(segment_key)
                        .map_or(false, |segment| self.segment_matches_user(&segment, user, state))
                })
            });
            maybe_negate(clause, matched)
        } else {
            clause_matches_user_no_segments(clause, user)
        }
    }

    fn segment_matches_user(&self, segment: &Segment, user: &User, state: &mut EvalState) -> bool {
        if segment.unbounded {
            self.big_segment_matches_user(segment, user, state)
        } else {
            simple_segment_matches_user(segment, user, true)
        }
    }

    fn big_segment_matches_user(
        &self,
        segment: &Segment,
        user: &User,
        state: &mut EvalState,
    ) -> bool {
        let generation = match segment.generation {
            Some(generation) => generation,
            None => {
                // A missing generation means the segment data predates big
                // segment support; we cannot query membership for it.
                state.big_segments_status = Some(BigSegmentsStatus::NotConfigured);
                return false;
            }
        };
        if state.big_segments_status.is_none() {
            // First big-segment reference in this evaluation: query the
            // external store once and reuse the result for the rest of it.
            let result = match (user.key(), &self.get_big_segments_membership) {
                (Some(user_key), Some(get_membership)) => get_membership(user_key),
                _ => None,
            };
            match result {
                Some(result) => {
                    state.big_segments_membership = result.membership;
                    state.big_segments_status = Some(result.status);
                }
                None => {
                    state.big_segments_membership = None;
                    state.big_segments_status = Some(BigSegmentsStatus::NotConfigured);
                }
            }
        }
        let segment_ref = format!("{}.g{}", segment.key, generation);
        if let Some(membership) = &state.big_segments_membership {
            if let Some(included) = membership.get(&segment_ref) {
                return *included;
            }
        }
        simple_segment_matches_user(segment, user, false)
    }
}

fn clause_matches_user_no_segments(clause: &Clause, user: &User) -> bool {
    let user_value = match user.attribute(&clause.attribute) {
        Some(value) => value,
        // A missing attribute fails the clause before negation is applied.
        None => return false,
    };
    let matched = match &user_value {
        Value::Array(elements) => elements
            .iter()
            .any(|element| match_any_clause_value(clause, element)),
        scalar => match_any_clause_value(clause, scalar),
    };
    maybe_negate(clause, matched)
}

fn match_any_clause_value(clause: &Clause, user_value: &Value) -> bool {
    clause
        .values
        .iter()
        .any(|clause_value| operators::apply(clause.op, user_value, clause_value))
}

fn maybe_negate(clause: &Clause, matched: bool) -> bool {
    if clause.negate {
        !matched
    } else {
        matched
    }
}

fn simple_segment_matches_user(
    segment: &Segment,
    user: &User,
    use_includes_and_excludes: bool,
) -> bool {
    let user_key = match user.key() {
        Some(key) => key,
        None => return false,
    };
    if use_includes_and_excludes {
        if segment.included.iter().any(|key| key == user_key) {
            return true;
        }
        if segment.excluded.iter().any(|key| key == user_key) {
            return false;
        }
    }
    segment
        .rules
        .iter()
        .any(|rule| segment_rule_matches_user(rule, user, &segment.key, &segment.salt))
}

fn segment_rule_matches_user(
    rule: &SegmentRule,
    user: &User,
    segment_key: &str,
    salt: &str,
) -> bool {
    if !rule
        .clauses
        .iter()
        .all(|clause| clause_matches_user_no_segments(clause, user))
    {
        return false;
    }
    let weight = match rule.weight {
        Some(weight) => weight,
        None => return true,
    };
    let bucket_by = rule.bucket_by.as_deref().unwrap_or("key");
    match bucketing::bucket_user(user, segment_key, bucket_by, salt, None) {
        Some(bucket) => bucket < weight as f64 / 100_000.0,
        None => false,
    }
}

fn off_value(flag: &FeatureFlag, reason: EvaluationReason) -> EvaluationDetail {
    match flag.off_variation {
        Some(index) => variation_value(flag, index, reason),
        None => EvaluationDetail {
            value: None,
            variation_index: None,
            reason,
        },
    }
}

fn variation_value(flag: &FeatureFlag, index: usize, reason: EvaluationReason) -> EvaluationDetail {
    match flag.variations.get(index) {
        Some(value) => EvaluationDetail {
            value: Some(value.clone()),
            variation_index: Some(index),
            reason,
        },
        None => {
            log::error!("Invalid variation index {} in flag {}", index, flag.key);
            EvaluationDetail::error(EvalErrorKind::MalformedFlag)
        }
    }
}

fn resolved_variation_value(
    flag: &FeatureFlag,
    variation: Option<usize>,
    reason: EvaluationReason,
) -> EvaluationDetail {
    match variation {
        Some(index) => variation_value(flag, index, reason),
        None => {
            log::error!(
                "Flag {} has a rule or fallthrough with neither variation nor rollout",
                flag.key
            );
            EvaluationDetail::error(EvalErrorKind::MalformedFlag)
        }
    }
}

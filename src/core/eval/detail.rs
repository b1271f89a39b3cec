// flagflux_rust/src/core/eval/detail.rs

use serde_json::{json, Map, Value};

/// Result of evaluating a flag for a user: the value plus how it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetail {
    pub value: Option<Value>,
    pub variation_index: Option<usize>,
    pub reason: EvaluationReason,
}

impl EvaluationDetail {
    pub fn error(kind: EvalErrorKind) -> Self {
        Self {
            value: None,
            variation_index: None,
            reason: EvaluationReason::error(kind),
        }
    }
}

/// Why an evaluation produced the value it did.
///
/// The optional big-segments status is attached after evaluation whenever a
/// big segment was consulted, whatever the reason kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReason {
    pub kind: ReasonKind,
    pub big_segments_status: Option<BigSegmentsStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReasonKind {
    Off,
    TargetMatch,
    RuleMatch {
        rule_index: usize,
        rule_id: Option<String>,
        in_experiment: bool,
    },
    Fallthrough {
        in_experiment: bool,
    },
    PrerequisiteFailed {
        prerequisite_key: String,
    },
    Error {
        error_kind: EvalErrorKind,
    },
}

impl EvaluationReason {
    pub fn off() -> Self {
        Self::from_kind(ReasonKind::Off)
    }

    pub fn target_match() -> Self {
        Self::from_kind(ReasonKind::TargetMatch)
    }

    pub fn rule_match(rule_index: usize, rule_id: Option<String>, in_experiment: bool) -> Self {
        Self::from_kind(ReasonKind::RuleMatch {
            rule_index,
            rule_id,
            in_experiment,
        })
    }

    pub fn fallthrough(in_experiment: bool) -> Self {
        Self::from_kind(ReasonKind::Fallthrough { in_experiment })
    }

    pub fn prerequisite_failed(prerequisite_key: impl Into<String>) -> Self {
        Self::from_kind(ReasonKind::PrerequisiteFailed {
            prerequisite_key: prerequisite_key.into(),
        })
    }

    pub fn error(error_kind: EvalErrorKind) -> Self {
        Self::from_kind(ReasonKind::Error { error_kind })
    }

    fn from_kind(kind: ReasonKind) -> Self {
        Self {
            kind,
            big_segments_status: None,
        }
    }

    pub fn set_big_segments_status(&mut self, status: BigSegmentsStatus) {
        self.big_segments_status = Some(status);
    }

    pub fn is_in_experiment(&self) -> bool {
        match &self.kind {
            ReasonKind::RuleMatch { in_experiment, .. } => *in_experiment,
            ReasonKind::Fallthrough { in_experiment } => *in_experiment,
            _ => false,
        }
    }

    /// On-wire JSON shape of the reason.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        match &self.kind {
            ReasonKind::Off => {
                out.insert("kind".to_string(), json!("OFF"));
            }
            ReasonKind::TargetMatch => {
                out.insert("kind".to_string(), json!("TARGET_MATCH"));
            }
            ReasonKind::RuleMatch {
                rule_index,
                rule_id,
                in_experiment,
            } => {
                out.insert("kind".to_string(), json!("RULE_MATCH"));
                out.insert("ruleIndex".to_string(), json!(rule_index));
                if let Some(rule_id) = rule_id {
                    out.insert("ruleId".to_string(), json!(rule_id));
                }
                if *in_experiment {
                    out.insert("inExperiment".to_string(), json!(true));
                }
            }
            ReasonKind::Fallthrough { in_experiment } => {
                out.insert("kind".to_string(), json!("FALLTHROUGH"));
                if *in_experiment {
                    out.insert("inExperiment".to_string(), json!(true));
                }
            }
            ReasonKind::PrerequisiteFailed { prerequisite_key } => {
                out.insert("kind".to_string(), json!("PREREQUISITE_FAILED"));
                out.insert("prerequisiteKey".to_string(), json!(prerequisite_key));
            }
            ReasonKind::Error { error_kind } => {
                out.insert("kind".to_string(), json!("ERROR"));
                out.insert("errorKind".to_string(), json!(error_kind.as_str()));
            }
        }
        if let Some(status) = self.big_segments_status {
            out.insert("bigSegmentsStatus".to_string(), json!(status.as_str()));
        }
        Value::Object(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    UserNotSpecified,
    FlagNotFound,
    MalformedFlag,
    Exception,
}

impl EvalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalErrorKind::UserNotSpecified => "USER_NOT_SPECIFIED",
            EvalErrorKind::FlagNotFound => "FLAG_NOT_FOUND",
            EvalErrorKind::MalformedFlag => "MALFORMED_FLAG",
            EvalErrorKind::Exception => "EXCEPTION",
        }
    }
}

/// Health of the external big-segment store as observed in one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigSegmentsStatus {
    Healthy,
    Stale,
    NotConfigured,
    StoreError,
}

impl BigSegmentsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BigSegmentsStatus::Healthy => "HEALTHY",
            BigSegmentsStatus::Stale => "STALE",
            BigSegmentsStatus::NotConfigured => "NOT_CONFIGURED",
            BigSegmentsStatus::StoreError => "STORE_ERROR",
        }
    }
}

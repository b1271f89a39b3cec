// flagflux_rust/src/core/model/flag.rs

use serde::Deserialize;
use serde_json::Value;

/// Feature flag configuration as delivered by the flag data system.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlag {
    pub key: String,
    pub version: u64,
    pub on: bool,
    pub prerequisites: Vec<Prerequisite>,
    pub salt: String,
    pub targets: Vec<Target>,
    pub rules: Vec<FlagRule>,
    pub fallthrough: VariationOrRollout,
    pub off_variation: Option<usize>,
    pub variations: Vec<Value>,
    pub track_events: bool,
    pub track_events_fallthrough: bool,
    pub debug_events_until_date: Option<u64>,
    pub deleted: bool,
}

/// Another flag that must evaluate to a specific variation before this flag
/// leaves its off state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

/// Explicit user-key allowlist for one variation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    pub values: Vec<String>,
    pub variation: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlagRule {
    pub id: Option<String>,
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    pub track_events: bool,
}

/// Either a fixed variation index or a percentage rollout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariationOrRollout {
    pub variation: Option<usize>,
    pub rollout: Option<Rollout>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rollout {
    pub kind: RolloutKind,
    pub variations: Vec<WeightedVariation>,
    pub bucket_by: Option<String>,
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloutKind {
    #[default]
    Rollout,
    /// Experiment rollouts bucket strictly by key and report
    /// `inExperiment` in evaluation reasons.
    Experiment,
}

impl<'de> Deserialize<'de> for RolloutKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "experiment" => RolloutKind::Experiment,
            _ => RolloutKind::Rollout,
        })
    }
}

/// One weighted slice of a rollout; `weight` is in units of 0.001%.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: i64,
    pub untracked: bool,
}

/// A single condition within a targeting rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Clause {
    pub attribute: String,
    pub op: Operator,
    pub values: Vec<Value>,
    pub negate: bool,
}

/// Clause operators. Operators added to the service after this build was
/// shipped deserialize as `Unrecognized` and never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    In,
    StartsWith,
    EndsWith,
    Matches,
    Contains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    SegmentMatch,
    #[default]
    Unrecognized,
}

impl Operator {
    fn from_name(name: &str) -> Operator {
        match name {
            "in" => Operator::In,
            "startsWith" => Operator::StartsWith,
            "endsWith" => Operator::EndsWith,
            "matches" => Operator::Matches,
            "contains" => Operator::Contains,
            "lessThan" => Operator::LessThan,
            "lessThanOrEqual" => Operator::LessThanOrEqual,
            "greaterThan" => Operator::GreaterThan,
            "greaterThanOrEqual" => Operator::GreaterThanOrEqual,
            "before" => Operator::Before,
            "after" => Operator::After,
            "segmentMatch" => Operator::SegmentMatch,
            _ => Operator::Unrecognized,
        }
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Operator::from_name(&name))
    }
}

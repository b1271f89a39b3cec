// flagflux_rust/src/core/model/mod.rs

pub mod flag;
pub mod segment;
pub mod user;

pub use self::flag::{
    Clause, FeatureFlag, FlagRule, Operator, Prerequisite, Rollout, RolloutKind, Target,
    VariationOrRollout, WeightedVariation,
};
pub use self::segment::{Segment, SegmentRule};
pub use self::user::{User, UserBuilder};

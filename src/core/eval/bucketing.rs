// flagflux_rust/src/core/eval/bucketing.rs

use crate::core::model::{RolloutKind, User, VariationOrRollout};
use crate::core::util::value_to_plain_string;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Denominator for the 15-hex-digit hash prefix, i.e. 0xFFFFFFFFFFFFFFF.
const BUCKET_SCALE: f64 = 0xFFF_FFFF_FFFF_FFFFu64 as f64;

/// Deterministic bucket in [0, 1) for percentage rollouts.
///
/// Returns `None` when the user has no key at all; a user whose bucketing
/// attribute is missing or unbucketable lands at 0.0 so that rollouts stay
/// deterministic for them too. Only strings and integers are bucketable.
pub fn bucket_user(
    user: &User,
    key: &str,
    bucket_by: &str,
    salt: &str,
    seed: Option<i64>,
) -> Option<f64> {
    user.key()?;
    let mut id_hash = match user.attribute(bucket_by).as_ref().and_then(bucketable_string_value) {
        Some(value) => value,
        None => return Some(0.0),
    };
    if let Some(secondary) = &user.secondary {
        id_hash.push('.');
        id_hash.push_str(&value_to_plain_string(secondary));
    }
    let hash_input = match seed {
        Some(seed) => format!("{}.{}", seed, id_hash),
        None => format!("{}.{}.{}", key, salt, id_hash),
    };
    let digest = Sha256::digest(hash_input.as_bytes());
    let hex = format!("{:x}", digest);
    let prefix = u64::from_str_radix(&hex[..15], 16).unwrap_or(0);
    Some(prefix as f64 / BUCKET_SCALE)
}

fn bucketable_string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_i64().map(|i| i.to_string()),
        _ => None,
    }
}

/// Resolve a variation-or-rollout to a concrete variation index.
///
/// The second element reports whether the user is in an experiment: true
/// only for experiment rollouts where the user was bucketable and landed in
/// a tracked bucket.
pub fn variation_index_for_user(
    flag_key: &str,
    salt: &str,
    vr: &VariationOrRollout,
    user: &User,
) -> (Option<usize>, bool) {
    if let Some(variation) = vr.variation {
        return (Some(variation), false);
    }
    let rollout = match &vr.rollout {
        Some(rollout) => rollout,
        None => return (None, false),
    };
    if rollout.variations.is_empty() {
        return (None, false);
    }
    let is_experiment = rollout.kind == RolloutKind::Experiment;
    // Experiments always bucket by key so results line up across variations.
    let bucket_by = if is_experiment {
        "key"
    } else {
        rollout.bucket_by.as_deref().unwrap_or("key")
    };
    let bucket = bucket_user(user, flag_key, bucket_by, salt, rollout.seed);
    let mut in_experiment = is_experiment && bucket.is_some();
    let mut sum = 0.0;
    for weighted in &rollout.variations {
        sum += weighted.weight as f64 / 100_000.0;
        let hit = match bucket {
            None => true,
            Some(bucket) => bucket < sum,
        };
        if hit {
            in_experiment = in_experiment && !weighted.untracked;
            return (Some(weighted.variation), in_experiment);
        }
    }
    // The weights summed below 100%; the last bucket absorbs the remainder.
    let last = &rollout.variations[rollout.variations.len() - 1];
    in_experiment = in_experiment && !last.untracked;
    (Some(last.variation), in_experiment)
}

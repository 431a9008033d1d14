//! Question selection: weighted bucket priority, then a uniform draw.
//!
//! Stage one orders all ten familiarity buckets by sampling without
//! replacement, using the weights as priority. Stage two walks that order
//! and draws uniformly from the first bucket holding at least one unlocked
//! item. Low-familiarity buckets come up first more often, but every bucket
//! is eventually reachable, so well-known items are never starved.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{BUCKET_COUNT, WEIGHT_SUM_TOLERANCE};
use crate::error::{QuizError, Result};
use crate::familiarity::Familiarity;
use crate::model::{UserId, VocabularyItem};
use crate::repository::VocabRepository;

/// Probability distribution over the ten familiarity buckets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BucketWeights([f64; BUCKET_COUNT]);

impl BucketWeights {
    /// Validate a weight vector: ten finite, non-negative entries summing to 1.
    pub fn new(weights: &[f64]) -> Result<Self> {
        let weights: [f64; BUCKET_COUNT] = weights.try_into().map_err(|_| {
            QuizError::InvalidWeights(format!(
                "expected {BUCKET_COUNT} weights, got {}",
                weights.len()
            ))
        })?;
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(QuizError::InvalidWeights(format!(
                "weight {i} is {w}, must be finite and non-negative"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(QuizError::InvalidWeights(format!(
                "weights sum to {sum}, expected 1"
            )));
        }
        Ok(Self(weights))
    }

    /// Every bucket equally likely to come first.
    pub fn uniform() -> Self {
        Self([1.0 / BUCKET_COUNT as f64; BUCKET_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, bucket: Familiarity) -> f64 {
        self.0[bucket.bucket()]
    }
}

impl Default for BucketWeights {
    /// Biased toward the low buckets, where practice is needed most.
    fn default() -> Self {
        Self([0.20, 0.17, 0.14, 0.12, 0.10, 0.08, 0.07, 0.05, 0.04, 0.03])
    }
}

impl TryFrom<Vec<f64>> for BucketWeights {
    type Error = QuizError;

    fn try_from(weights: Vec<f64>) -> Result<Self> {
        Self::new(&weights)
    }
}

impl From<BucketWeights> for Vec<f64> {
    fn from(w: BucketWeights) -> Vec<f64> {
        w.0.to_vec()
    }
}

/// Order in which buckets are tried, drawn without replacement.
///
/// Remaining buckets stay in ascending order. Each step draws
/// `r ∈ [0, total)` over the remaining weight and takes the first bucket
/// whose running sum exceeds `r`. Once only zero-weight buckets remain they
/// are taken uniformly at random.
pub fn priority_permutation(
    weights: &BucketWeights,
    rng: &mut impl Rng,
) -> [Familiarity; BUCKET_COUNT] {
    let mut remaining: Vec<Familiarity> = Familiarity::all().collect();
    let mut order = [Familiarity::MIN; BUCKET_COUNT];

    for slot in order.iter_mut() {
        let total: f64 = remaining.iter().map(|&b| weights.get(b)).sum();
        let idx = if total > 0.0 {
            let r = rng.random::<f64>() * total;
            pick_weighted(&remaining, weights, r)
        } else {
            rng.random_range(0..remaining.len())
        };
        *slot = remaining.remove(idx);
    }

    order
}

/// Index of the first bucket whose cumulative weight exceeds `r`.
/// Falls back to the last positive-weight bucket when rounding leaves
/// `r` at or past the total.
fn pick_weighted(remaining: &[Familiarity], weights: &BucketWeights, r: f64) -> usize {
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &bucket) in remaining.iter().enumerate() {
        let w = weights.get(bucket);
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if r < cumulative {
            return i;
        }
    }
    last_positive
}

/// Pick the next item to ask `user_id` from their active set.
///
/// Fails with `NoEligibleItem` when no bucket holds an unlocked item, which
/// only happens if the user's tracking rows are missing.
pub fn select_question<R>(
    repo: &R,
    user_id: UserId,
    weights: &BucketWeights,
    rng: &mut impl Rng,
) -> Result<VocabularyItem>
where
    R: VocabRepository + ?Sized,
{
    let set_id = repo.active_set(user_id)?;

    for bucket in priority_permutation(weights, rng) {
        let mut candidates = repo.items_by_bucket(user_id, set_id, bucket)?;
        if candidates.is_empty() {
            continue;
        }
        let pick = rng.random_range(0..candidates.len());
        let item = candidates.swap_remove(pick);
        tracing::debug!(
            user_id,
            set_id,
            bucket = bucket.value(),
            vocab_id = item.vocab_id,
            candidates = candidates.len() + 1,
            "selected question"
        );
        return Ok(item);
    }

    Err(QuizError::NoEligibleItem { user_id, set_id })
}

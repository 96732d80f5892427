//! Small numeric helpers shared by the aggregation stages.
//!
//! Every helper here is total: empty or zero-weight inputs resolve to a
//! defined value instead of NaN.

use crate::WeightedScore;

/// Total weight below which a weighted average is treated as undefined.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sum of the weights.
pub fn total_weight(samples: &[WeightedScore]) -> f64 {
    samples.iter().map(|s| s.weight).sum()
}

/// Σ(score·weight) / Σweight, or `None` when Σweight ≤ [`WEIGHT_EPSILON`].
pub fn weighted_mean(samples: &[WeightedScore]) -> Option<f64> {
    let total = total_weight(samples);
    if total <= WEIGHT_EPSILON {
        return None;
    }
    let weighted_sum: f64 = samples.iter().map(|s| s.score * s.weight).sum();
    Some(weighted_sum / total)
}

/// Weighted median of the scores, or `None` when Σweight ≤ [`WEIGHT_EPSILON`].
///
/// Scores are sorted ascending and the first score whose cumulative weight
/// reaches half the total is returned. When the cumulative weight lands exactly
/// on the half-way point the result is the midpoint with the next score.
pub fn weighted_median(samples: &[WeightedScore]) -> Option<f64> {
    let total = total_weight(samples);
    if total <= WEIGHT_EPSILON {
        return None;
    }

    let mut sorted: Vec<WeightedScore> = samples
        .iter()
        .copied()
        .filter(|s| s.weight > 0.0)
        .collect();
    sorted.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.weight.total_cmp(&b.weight)));

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (i, sample) in sorted.iter().enumerate() {
        cumulative += sample.weight;
        if (cumulative - half).abs() <= WEIGHT_EPSILON {
            return Some(match sorted.get(i + 1) {
                Some(next) => (sample.score + next.score) / 2.0,
                None => sample.score,
            });
        }
        if cumulative > half {
            return Some(sample.score);
        }
    }

    sorted.last().map(|s| s.score)
}

/// Clamp that also maps NaN to `fallback`.
pub fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

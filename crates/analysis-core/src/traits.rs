use crate::{ClassProbabilities, SentimentLabel, WeightedScore};

/// Policy turning a classifier label into a numeric score.
///
/// The mapping is decided upstream of aggregation; implementations must return
/// a value in [-1.0, 1.0] for any confidence in [0.0, 1.0].
pub trait ScoreMapping: Send + Sync {
    fn score(&self, label: SentimentLabel, confidence: f64) -> f64;
    fn name(&self) -> &str;

    /// Score straight from class probabilities. Defaults to scoring the arg-max label.
    fn score_probabilities(&self, probabilities: &ClassProbabilities) -> f64 {
        let (label, confidence) = probabilities.classify();
        self.score(label, confidence)
    }
}

/// Policy folding one ticker's weighted article scores into a single sentiment.
///
/// Receives only articles inside the recency window. The caller owns the
/// zero-weight guard and output clamping; strategies may assume finite inputs
/// with non-negative weights.
pub trait AggregationStrategy: Send + Sync {
    fn combine(&self, samples: &[WeightedScore]) -> f64;
    fn name(&self) -> &str;
}

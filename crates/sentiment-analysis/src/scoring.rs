//! Label → score policies applied to classifier output before aggregation.

use analysis_core::{AnalysisError, ClassProbabilities, ScoreMapping, SentimentLabel};
use std::str::FromStr;
use std::sync::Arc;

/// Minimum gap between positive and negative probability before a neutral
/// article is nudged towards either side.
const NEUTRAL_BIAS_MARGIN: f64 = 0.1;
const NEUTRAL_BIAS_SCALE: f64 = 0.3;

/// Coarse mapping: positive → +1, negative → −1, neutral → 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscreteMapping;

impl ScoreMapping for DiscreteMapping {
    fn score(&self, label: SentimentLabel, _confidence: f64) -> f64 {
        label.direction()
    }

    fn name(&self) -> &str {
        "discrete"
    }
}

/// Confidence-graded mapping: positive → 0.5 + 0.5c, negative → −(0.5 + 0.5c),
/// neutral → 0. With full class probabilities a neutral article keeps a slight
/// lean when one polar class clearly dominates the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScaledMapping;

impl ScoreMapping for ConfidenceScaledMapping {
    fn score(&self, label: SentimentLabel, confidence: f64) -> f64 {
        let magnitude = 0.5 + 0.5 * confidence.clamp(0.0, 1.0);
        label.direction() * magnitude
    }

    fn name(&self) -> &str {
        "confidence_scaled"
    }

    fn score_probabilities(&self, probabilities: &ClassProbabilities) -> f64 {
        let (label, confidence) = probabilities.classify();
        if label != SentimentLabel::Neutral {
            return self.score(label, confidence);
        }
        let (pos, neg) = (probabilities.positive, probabilities.negative);
        if pos > neg + NEUTRAL_BIAS_MARGIN {
            pos * NEUTRAL_BIAS_SCALE
        } else if neg > pos + NEUTRAL_BIAS_MARGIN {
            -neg * NEUTRAL_BIAS_SCALE
        } else {
            0.0
        }
    }
}

/// Named selector for the configured mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreMappingKind {
    Discrete,
    #[default]
    ConfidenceScaled,
}

impl ScoreMappingKind {
    pub fn build(&self) -> Arc<dyn ScoreMapping> {
        match self {
            ScoreMappingKind::Discrete => Arc::new(DiscreteMapping),
            ScoreMappingKind::ConfidenceScaled => Arc::new(ConfidenceScaledMapping),
        }
    }
}

impl FromStr for ScoreMappingKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discrete" => Ok(ScoreMappingKind::Discrete),
            "confidence_scaled" | "confidence-scaled" => Ok(ScoreMappingKind::ConfidenceScaled),
            other => Err(AnalysisError::Configuration(format!(
                "unknown score mapping '{}' (expected discrete or confidence_scaled)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_discrete_ignores_confidence() {
        let m = DiscreteMapping;
        assert_eq!(m.score(SentimentLabel::Positive, 0.2), 1.0);
        assert_eq!(m.score(SentimentLabel::Negative, 0.99), -1.0);
        assert_eq!(m.score(SentimentLabel::Neutral, 0.9), 0.0);
    }

    #[test]
    fn test_confidence_scaled_range() {
        let m = ConfidenceScaledMapping;
        assert_abs_diff_eq!(m.score(SentimentLabel::Positive, 0.0), 0.5);
        assert_abs_diff_eq!(m.score(SentimentLabel::Positive, 1.0), 1.0);
        assert_abs_diff_eq!(m.score(SentimentLabel::Negative, 0.8), -0.9, epsilon = 1e-12);
        assert_eq!(m.score(SentimentLabel::Neutral, 0.8), 0.0);
    }

    #[test]
    fn test_neutral_lean_from_probabilities() {
        let m = ConfidenceScaledMapping;
        let leaning_up = ClassProbabilities { positive: 0.35, negative: 0.05, neutral: 0.6 };
        assert_abs_diff_eq!(m.score_probabilities(&leaning_up), 0.105, epsilon = 1e-12);

        let leaning_down = ClassProbabilities { positive: 0.05, negative: 0.3, neutral: 0.65 };
        assert_abs_diff_eq!(m.score_probabilities(&leaning_down), -0.09, epsilon = 1e-12);

        let balanced = ClassProbabilities { positive: 0.2, negative: 0.15, neutral: 0.65 };
        assert_eq!(m.score_probabilities(&balanced), 0.0);
    }

    #[test]
    fn test_discrete_probabilities_use_argmax() {
        let probs = ClassProbabilities { positive: 0.1, negative: 0.6, neutral: 0.3 };
        assert_eq!(DiscreteMapping.score_probabilities(&probs), -1.0);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("discrete".parse::<ScoreMappingKind>().unwrap(), ScoreMappingKind::Discrete);
        assert_eq!(
            "Confidence-Scaled".parse::<ScoreMappingKind>().unwrap(),
            ScoreMappingKind::ConfidenceScaled
        );
        assert!("sigmoid".parse::<ScoreMappingKind>().is_err());
        assert_eq!(ScoreMappingKind::Discrete.build().name(), "discrete");
    }
}

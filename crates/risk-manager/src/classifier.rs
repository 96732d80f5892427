use analysis_core::stats::{clamp_or, mean};
use analysis_core::{PortfolioHolding, RiskAssessment, TickerSentiment};
use std::collections::BTreeMap;

use crate::models::{RiskAggregation, RiskThresholds};

/// `|sentiment| × weight × (1 − confidence)`.
///
/// Non-decreasing in |sentiment| and in weight for a fixed confidence.
/// Inputs are clamped to their valid ranges so the result is never negative.
pub fn risk_score(sentiment: f64, weight: f64, confidence: f64) -> f64 {
    let magnitude = clamp_or(sentiment.abs(), 0.0, 1.0, 0.0);
    let weight = clamp_or(weight, 0.0, 1.0, 0.0);
    let uncertainty = 1.0 - clamp_or(confidence, 0.0, 1.0, 1.0);
    magnitude * weight * uncertainty
}

/// Pure classification of a portfolio's sentiment into a risk level.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier {
    thresholds: RiskThresholds,
    aggregation: RiskAggregation,
}

impl RiskClassifier {
    pub fn new(thresholds: RiskThresholds, aggregation: RiskAggregation) -> Self {
        Self {
            thresholds,
            aggregation,
        }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn aggregation(&self) -> RiskAggregation {
        self.aggregation
    }

    /// Per-holding risk scores. A holding without sentiment scores zero but
    /// still counts towards a mean.
    pub fn ticker_scores(
        &self,
        holdings: &[PortfolioHolding],
        sentiments: &BTreeMap<String, TickerSentiment>,
    ) -> BTreeMap<String, f64> {
        holdings
            .iter()
            .map(|h| {
                let score = sentiments
                    .get(&h.ticker)
                    .map(|s| risk_score(s.sentiment, h.weight, s.confidence))
                    .unwrap_or(0.0);
                (h.ticker.clone(), score)
            })
            .collect()
    }

    pub fn aggregate_score(&self, ticker_scores: &BTreeMap<String, f64>) -> f64 {
        let scores: Vec<f64> = ticker_scores.values().copied().collect();
        match self.aggregation {
            RiskAggregation::Mean => mean(&scores),
            RiskAggregation::WeightedSum => scores.iter().sum(),
        }
    }

    pub fn assess(
        &self,
        holdings: &[PortfolioHolding],
        sentiments: &BTreeMap<String, TickerSentiment>,
    ) -> RiskAssessment {
        let ticker_scores = self.ticker_scores(holdings, sentiments);
        let risk_score = self.aggregate_score(&ticker_scores);
        let level = self.thresholds.classify(risk_score);

        let per_ticker_risk = ticker_scores
            .iter()
            .map(|(ticker, score)| (ticker.clone(), self.thresholds.classify(*score)))
            .collect();

        tracing::debug!(
            risk_score,
            level = %level,
            aggregation = %self.aggregation,
            "Classified portfolio risk"
        );

        RiskAssessment {
            level,
            signal: level.signal(),
            reason: level.reason().to_string(),
            risk_score,
            per_ticker_risk,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// Canonical ticker form used for every lookup: trimmed, upper-case.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Classification label produced by the upstream sentiment model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }

    /// +1 for positive, -1 for negative, 0 for neutral
    pub fn direction(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -1.0,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(AnalysisError::InvalidInput(format!(
                "unknown sentiment label '{}'",
                other
            ))),
        }
    }
}

/// Class probabilities as emitted by a three-way financial sentiment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl ClassProbabilities {
    /// Arg-max label and its probability. Ties resolve positive, negative, neutral.
    pub fn classify(&self) -> (SentimentLabel, f64) {
        let mut best = (SentimentLabel::Positive, self.positive);
        if self.negative > best.1 {
            best = (SentimentLabel::Negative, self.negative);
        }
        if self.neutral > best.1 {
            best = (SentimentLabel::Neutral, self.neutral);
        }
        best
    }

    pub fn probability(&self, label: SentimentLabel) -> f64 {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.positive, self.negative, self.neutral]
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
    }
}

/// One article's classification result plus the metadata needed for weighting.
///
/// Records are created once per run and never mutated. `score` is already
/// materialized by the upstream classifier; the aggregator never recomputes it
/// from `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSentiment {
    pub ticker: String,
    pub label: SentimentLabel,
    /// Polarity in [-1.0, 1.0]
    pub score: f64,
    /// Model certainty in [0.0, 1.0]
    pub confidence: f64,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

impl ArticleSentiment {
    /// Age in fractional hours relative to `now`. Negative for future timestamps.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.published_at).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Per-article weighting breakdown, transient within one aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedContribution {
    pub recency_weight: f64,
    pub credibility_weight: f64,
    /// recency × credibility × confidence, always in [0, 1]
    pub combined_weight: f64,
}

/// A score paired with its combined weight, as handed to an aggregation strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub score: f64,
    pub weight: f64,
}

/// Output of the per-ticker aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSentiment {
    pub ticker: String,
    /// Bounded to [-1.0, 1.0]
    pub sentiment: f64,
    /// Mean confidence of contributing articles, bounded to [0.0, 1.0]
    pub confidence: f64,
    pub article_count: usize,
}

impl TickerSentiment {
    /// Neutral, no-confidence result used when nothing contributes.
    pub fn neutral(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            sentiment: 0.0,
            confidence: 0.0,
            article_count: 0,
        }
    }

    pub fn is_neutral_fallback(&self) -> bool {
        self.article_count == 0
    }
}

/// One line of a user's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub ticker: String,
    /// Fraction of the portfolio in [0.0, 1.0]
    pub weight: f64,
}

impl PortfolioHolding {
    pub fn new(ticker: impl AsRef<str>, weight: f64) -> Self {
        Self {
            ticker: normalize_ticker(ticker.as_ref()),
            weight,
        }
    }
}

/// Discrete risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn signal(&self) -> ActionSignal {
        match self {
            RiskLevel::Low => ActionSignal::Hold,
            RiskLevel::Medium => ActionSignal::Monitor,
            RiskLevel::High => ActionSignal::Review,
        }
    }

    /// Fixed, human-readable explanation for the level.
    pub fn reason(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Portfolio sentiment is stable with low risk indicators.",
            RiskLevel::Medium => {
                "Portfolio shows moderate sentiment volatility. Monitor closely."
            }
            RiskLevel::High => {
                "High risk detected. Review portfolio positions and consider adjustments."
            }
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action suggested to the portfolio owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSignal {
    Hold,
    Monitor,
    Review,
}

impl ActionSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSignal::Hold => "hold",
            ActionSignal::Monitor => "monitor",
            ActionSignal::Review => "review",
        }
    }
}

impl fmt::Display for ActionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the risk classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub signal: ActionSignal,
    pub reason: String,
    /// Aggregate risk score the level was derived from
    pub risk_score: f64,
    pub per_ticker_risk: BTreeMap<String, RiskLevel>,
}

/// Everything one user's run produces, handed to reporting and delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub as_of: DateTime<Utc>,
    pub portfolio: Vec<PortfolioHolding>,
    pub tickers: Vec<TickerSentiment>,
    pub portfolio_sentiment: f64,
    pub risk: RiskAssessment,
    /// Records excluded at ingestion (out of range, future-dated, ...)
    pub rejected_articles: usize,
    /// True when the portfolio weights had to be rescaled before aggregation
    pub weights_normalized: bool,
}

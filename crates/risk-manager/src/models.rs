use analysis_core::{AnalysisError, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cut-offs between risk levels.
///
/// `score < low` is low, `low <= score <= high` is medium, `score > high` is
/// high. Both lower bounds are closed, like the recency buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct RiskThresholds {
    low: f64,
    high: f64,
}

impl RiskThresholds {
    pub fn new(low: f64, high: f64) -> Result<Self, AnalysisError> {
        if !low.is_finite() || !high.is_finite() || low < 0.0 {
            return Err(AnalysisError::Configuration(format!(
                "risk thresholds must be finite and non-negative (low={}, high={})",
                low, high
            )));
        }
        if low > high {
            return Err(AnalysisError::Configuration(format!(
                "low risk threshold {} is above high threshold {}",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn classify(&self, score: f64) -> RiskLevel {
        match score {
            s if s.is_nan() => RiskLevel::Low,
            s if s < self.low => RiskLevel::Low,
            s if s <= self.high => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

#[derive(Deserialize)]
struct RawThresholds {
    low: f64,
    high: f64,
}

impl TryFrom<RawThresholds> for RiskThresholds {
    type Error = AnalysisError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(raw.low, raw.high)
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.15,
            high: 0.5,
        }
    }
}

/// How per-ticker risk scores fold into the portfolio score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAggregation {
    /// Arithmetic mean over every holding
    Mean,
    /// Plain sum; each per-ticker score already carries its portfolio weight
    #[default]
    WeightedSum,
}

impl RiskAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAggregation::Mean => "mean",
            RiskAggregation::WeightedSum => "weighted_sum",
        }
    }
}

impl fmt::Display for RiskAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskAggregation {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mean" => Ok(RiskAggregation::Mean),
            "weighted_sum" | "sum" => Ok(RiskAggregation::WeightedSum),
            other => Err(AnalysisError::Configuration(format!(
                "unknown risk aggregation '{}' (expected mean or weighted_sum)",
                other
            ))),
        }
    }
}

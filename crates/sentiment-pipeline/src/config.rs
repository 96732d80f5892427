use analysis_core::AnalysisError;
use anyhow::{Context, Result};
use portfolio_manager::WEIGHT_TOLERANCE;
use risk_manager::{RiskAggregation, RiskClassifier, RiskThresholds};
use sentiment_analysis::{AggregationMethod, RecencyBucket, ScoreMappingKind, WeightTable};
use std::env;

/// Run-wide settings, read once and shared read-only by every user run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Recency weights for [0,6h), [6h,12h) and [12h, window)
    pub recency_weight_6h: f64,
    pub recency_weight_12h: f64,
    pub recency_weight_24h: f64,
    pub news_window_hours: f64,

    pub source_weights: Vec<(String, f64)>,
    pub default_source_weight: f64,

    pub risk_threshold_low: f64,
    pub risk_threshold_high: f64,
    pub risk_aggregation: RiskAggregation,

    pub aggregation_method: AggregationMethod,
    pub score_mapping: ScoreMappingKind,
    /// Rescale bad portfolio weights instead of rejecting the user's run
    pub normalize_portfolio_weights: bool,

    pub concurrency: usize,
    pub database_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recency_weight_6h: 1.0,
            recency_weight_12h: 0.8,
            recency_weight_24h: 0.6,
            news_window_hours: 24.0,
            source_weights: vec![
                ("reuters".to_string(), 1.0),
                ("bloomberg".to_string(), 0.95),
                ("cnbc".to_string(), 0.85),
            ],
            default_source_weight: 0.6,
            risk_threshold_low: 0.15,
            risk_threshold_high: 0.5,
            risk_aggregation: RiskAggregation::WeightedSum,
            aggregation_method: AggregationMethod::WeightedMean,
            score_mapping: ScoreMappingKind::ConfidenceScaled,
            normalize_portfolio_weights: false,
            concurrency: 4,
            database_url: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let parse_f64 = |key: &str, default: f64| -> Result<f64> {
            match get(key) {
                Some(v) => v.parse().with_context(|| format!("{} must be a number, got '{}'", key, v)),
                None => Ok(default),
            }
        };

        let source_weights = match get("SOURCE_WEIGHTS") {
            Some(v) => parse_source_weights(&v).context("parsing SOURCE_WEIGHTS")?,
            None => defaults.source_weights.clone(),
        };

        let aggregation_method = match get("AGGREGATION_METHOD") {
            Some(v) => v.parse::<AggregationMethod>()?,
            None => defaults.aggregation_method,
        };
        let aggregation_method = match get("MIN_ARTICLES_PER_TICKER") {
            Some(v) => aggregation_method.with_min_articles(
                v.parse()
                    .with_context(|| format!("MIN_ARTICLES_PER_TICKER must be an integer, got '{}'", v))?,
            ),
            None => aggregation_method,
        };

        let config = Self {
            recency_weight_6h: parse_f64("RECENCY_WEIGHT_6H", defaults.recency_weight_6h)?,
            recency_weight_12h: parse_f64("RECENCY_WEIGHT_12H", defaults.recency_weight_12h)?,
            recency_weight_24h: parse_f64("RECENCY_WEIGHT_24H", defaults.recency_weight_24h)?,
            news_window_hours: parse_f64("NEWS_TIME_WINDOW_HOURS", defaults.news_window_hours)?,
            source_weights,
            default_source_weight: parse_f64("SOURCE_WEIGHT_DEFAULT", defaults.default_source_weight)?,
            risk_threshold_low: parse_f64("RISK_THRESHOLD_LOW", defaults.risk_threshold_low)?,
            risk_threshold_high: parse_f64("RISK_THRESHOLD_HIGH", defaults.risk_threshold_high)?,
            risk_aggregation: match get("RISK_AGGREGATION") {
                Some(v) => v.parse()?,
                None => defaults.risk_aggregation,
            },
            aggregation_method,
            score_mapping: match get("SCORE_MAPPING") {
                Some(v) => v.parse()?,
                None => defaults.score_mapping,
            },
            normalize_portfolio_weights: match get("NORMALIZE_PORTFOLIO_WEIGHTS") {
                Some(v) => parse_bool(&v)
                    .with_context(|| format!("NORMALIZE_PORTFOLIO_WEIGHTS must be true or false, got '{}'", v))?,
                None => defaults.normalize_portfolio_weights,
            },
            concurrency: match get("PIPELINE_CONCURRENCY") {
                Some(v) => v
                    .parse()
                    .with_context(|| format!("PIPELINE_CONCURRENCY must be an integer, got '{}'", v))?,
                None => defaults.concurrency,
            },
            database_url: get("DATABASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings that would only surface mid-run.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.weight_table()?;
        self.risk_thresholds()?;
        if self.concurrency == 0 {
            return Err(AnalysisError::Configuration(
                "PIPELINE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn weight_table(&self) -> Result<WeightTable, AnalysisError> {
        WeightTable::new(
            vec![
                RecencyBucket::new(6.0, self.recency_weight_6h),
                RecencyBucket::new(12.0, self.recency_weight_12h),
                RecencyBucket::new(self.news_window_hours, self.recency_weight_24h),
            ],
            self.source_weights.iter().map(|(name, weight)| (name.as_str(), *weight)),
            self.default_source_weight,
        )
    }

    pub fn risk_thresholds(&self) -> Result<RiskThresholds, AnalysisError> {
        RiskThresholds::new(self.risk_threshold_low, self.risk_threshold_high)
    }

    pub fn risk_classifier(&self) -> Result<RiskClassifier, AnalysisError> {
        Ok(RiskClassifier::new(self.risk_thresholds()?, self.risk_aggregation))
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "  Recency weights: {}/{}/{} (window {}h)",
            self.recency_weight_6h,
            self.recency_weight_12h,
            self.recency_weight_24h,
            self.news_window_hours
        );
        tracing::info!(
            "  Source weights: {} configured, default {}",
            self.source_weights.len(),
            self.default_source_weight
        );
        tracing::info!(
            "  Risk thresholds: low < {}, high > {} ({})",
            self.risk_threshold_low,
            self.risk_threshold_high,
            self.risk_aggregation
        );
        tracing::info!("  Aggregation: {:?}", self.aggregation_method);
        tracing::info!("  Score mapping: {:?}", self.score_mapping);
        tracing::info!(
            "  Portfolio weights: tolerance {}, normalize {}",
            WEIGHT_TOLERANCE,
            self.normalize_portfolio_weights
        );
        tracing::info!("  Concurrency: {}", self.concurrency);
    }
}

/// Parse `name=weight,name=weight`.
pub fn parse_source_weights(raw: &str) -> Result<Vec<(String, f64)>, AnalysisError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, weight) = entry.split_once('=').ok_or_else(|| {
                AnalysisError::Configuration(format!("source weight '{}' is not name=weight", entry))
            })?;
            let weight: f64 = weight.trim().parse().map_err(|_| {
                AnalysisError::Configuration(format!("source weight for '{}' is not a number", name.trim()))
            })?;
            Ok((name.trim().to_string(), weight))
        })
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.news_window_hours, 24.0);
        assert_eq!(config.risk_aggregation, RiskAggregation::WeightedSum);
        assert_eq!(config.aggregation_method, AggregationMethod::WeightedMean);
        assert_eq!(config.score_mapping, ScoreMappingKind::ConfidenceScaled);
        assert!(!config.normalize_portfolio_weights);
        assert!(config.database_url.is_none());

        let table = config.weight_table().unwrap();
        assert_eq!(table.credibility_weight("Reuters"), 1.0);
        assert_eq!(table.recency_weight(13.0), 0.6);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SOURCE_WEIGHTS", "reuters=0.9, financial times=0.8"),
            ("SOURCE_WEIGHT_DEFAULT", "0.4"),
            ("NEWS_TIME_WINDOW_HOURS", "48"),
            ("RISK_AGGREGATION", "mean"),
            ("AGGREGATION_METHOD", "count_threshold"),
            ("MIN_ARTICLES_PER_TICKER", "3"),
            ("SCORE_MAPPING", "discrete"),
            ("NORMALIZE_PORTFOLIO_WEIGHTS", "true"),
            ("PIPELINE_CONCURRENCY", "8"),
            ("DATABASE_URL", "sqlite:history.db"),
        ])
        .unwrap();

        assert_eq!(config.aggregation_method, AggregationMethod::CountThreshold { min_articles: 3 });
        assert_eq!(config.risk_aggregation, RiskAggregation::Mean);
        assert_eq!(config.score_mapping, ScoreMappingKind::Discrete);
        assert!(config.normalize_portfolio_weights);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.database_url.as_deref(), Some("sqlite:history.db"));

        let table = config.weight_table().unwrap();
        assert_eq!(table.window_hours(), 48.0);
        assert_eq!(table.credibility_weight("Financial Times"), 0.8);
        assert_eq!(table.credibility_weight("Bloomberg"), 0.4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("RISK_THRESHOLD_LOW", "0.9")]).is_err());
        assert!(config_from(&[("RECENCY_WEIGHT_12H", "1.5")]).is_err());
        assert!(config_from(&[("NEWS_TIME_WINDOW_HOURS", "10")]).is_err());
        assert!(config_from(&[("SCORE_MAPPING", "sigmoid")]).is_err());
        assert!(config_from(&[("PIPELINE_CONCURRENCY", "0")]).is_err());
        assert!(config_from(&[("SOURCE_WEIGHTS", "reuters")]).is_err());
        assert!(config_from(&[("NORMALIZE_PORTFOLIO_WEIGHTS", "maybe")]).is_err());
    }

    #[test]
    fn test_parse_source_weights() {
        let weights = parse_source_weights("reuters=1.0,,bloomberg = 0.95 ").unwrap();
        assert_eq!(
            weights,
            vec![("reuters".to_string(), 1.0), ("bloomberg".to_string(), 0.95)]
        );
        assert!(parse_source_weights("reuters=high").is_err());
    }
}

use analysis_core::stats::{self, WEIGHT_EPSILON};
use analysis_core::{
    normalize_ticker, AggregationStrategy, AnalysisError, ArticleSentiment, TickerSentiment,
    WeightedScore,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::ingest::validate_article;
use crate::weights::WeightTable;

pub const DEFAULT_MIN_ARTICLES: usize = 2;

/// Σ(score·weight) / Σweight
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMean;

impl AggregationStrategy for WeightedMean {
    fn combine(&self, samples: &[WeightedScore]) -> f64 {
        stats::weighted_mean(samples).unwrap_or(0.0)
    }

    fn name(&self) -> &str {
        "weighted_mean"
    }
}

/// Weighted median, robust against a single loud outlier article.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMedian;

impl AggregationStrategy for WeightedMedian {
    fn combine(&self, samples: &[WeightedScore]) -> f64 {
        stats::weighted_median(samples).unwrap_or(0.0)
    }

    fn name(&self) -> &str {
        "weighted_median"
    }
}

/// Weighted mean that stays neutral until enough articles are in the window.
#[derive(Debug, Clone, Copy)]
pub struct CountThreshold {
    pub min_articles: usize,
}

impl Default for CountThreshold {
    fn default() -> Self {
        Self {
            min_articles: DEFAULT_MIN_ARTICLES,
        }
    }
}

impl AggregationStrategy for CountThreshold {
    fn combine(&self, samples: &[WeightedScore]) -> f64 {
        if samples.len() < self.min_articles {
            return 0.0;
        }
        stats::weighted_mean(samples).unwrap_or(0.0)
    }

    fn name(&self) -> &str {
        "count_threshold"
    }
}

/// Named selector for the per-ticker aggregation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMethod {
    #[default]
    WeightedMean,
    WeightedMedian,
    CountThreshold { min_articles: usize },
}

impl AggregationMethod {
    pub fn strategy(&self) -> Arc<dyn AggregationStrategy> {
        match *self {
            AggregationMethod::WeightedMean => Arc::new(WeightedMean),
            AggregationMethod::WeightedMedian => Arc::new(WeightedMedian),
            AggregationMethod::CountThreshold { min_articles } => {
                Arc::new(CountThreshold { min_articles })
            }
        }
    }

    /// Overrides the article floor; no-op for the other methods.
    pub fn with_min_articles(self, min_articles: usize) -> Self {
        match self {
            AggregationMethod::CountThreshold { .. } => {
                AggregationMethod::CountThreshold { min_articles }
            }
            other => other,
        }
    }
}

impl FromStr for AggregationMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "weighted_mean" | "mean" => Ok(AggregationMethod::WeightedMean),
            "weighted_median" | "median" => Ok(AggregationMethod::WeightedMedian),
            "count_threshold" => Ok(AggregationMethod::CountThreshold {
                min_articles: DEFAULT_MIN_ARTICLES,
            }),
            other => Err(AnalysisError::Configuration(format!(
                "unknown aggregation method '{}' (expected weighted_mean, weighted_median or count_threshold)",
                other
            ))),
        }
    }
}

/// Folds one ticker's scored articles into a bounded [`TickerSentiment`].
///
/// The weight table is injected at construction and shared read-only, so one
/// aggregator can serve every ticker (and every user) in a run.
#[derive(Clone)]
pub struct TickerAggregator {
    weights: Arc<WeightTable>,
    strategy: Arc<dyn AggregationStrategy>,
}

impl TickerAggregator {
    pub fn new(weights: Arc<WeightTable>) -> Self {
        Self::with_strategy(weights, Arc::new(WeightedMean))
    }

    pub fn with_strategy(weights: Arc<WeightTable>, strategy: Arc<dyn AggregationStrategy>) -> Self {
        Self { weights, strategy }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn aggregate(
        &self,
        ticker: &str,
        articles: &[ArticleSentiment],
        now: DateTime<Utc>,
    ) -> TickerSentiment {
        let ticker = normalize_ticker(ticker);

        let mut samples = Vec::with_capacity(articles.len());
        let mut confidences = Vec::with_capacity(articles.len());
        for article in articles {
            // Output clamping only guards rounding; bad inputs never get that far.
            if let Err(reason) = validate_article(article, now) {
                tracing::warn!(
                    ticker = %ticker,
                    source = %article.source,
                    "Skipping invalid article sentiment: {}",
                    reason
                );
                continue;
            }
            let contribution = self.weights.contribution(article, now);
            if contribution.recency_weight <= 0.0 {
                continue;
            }
            samples.push(WeightedScore {
                score: article.score,
                weight: contribution.combined_weight,
            });
            confidences.push(article.confidence);
        }

        if samples.is_empty() {
            tracing::info!(
                ticker = %ticker,
                supplied = articles.len(),
                "No articles inside the recency window, using neutral sentiment"
            );
            return TickerSentiment::neutral(ticker);
        }

        // Fixed summation order keeps the result independent of input order.
        samples.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.weight.total_cmp(&b.weight)));
        confidences.sort_by(|a, b| a.total_cmp(b));

        let sentiment = if stats::total_weight(&samples) > WEIGHT_EPSILON {
            self.strategy.combine(&samples)
        } else {
            tracing::info!(
                ticker = %ticker,
                articles = samples.len(),
                "Combined article weight is zero, using neutral sentiment"
            );
            0.0
        };

        let result = TickerSentiment {
            sentiment: stats::clamp_or(sentiment, -1.0, 1.0, 0.0),
            confidence: stats::clamp_or(stats::mean(&confidences), 0.0, 1.0, 0.0),
            article_count: samples.len(),
            ticker,
        };

        tracing::debug!(
            ticker = %result.ticker,
            sentiment = result.sentiment,
            confidence = result.confidence,
            articles = result.article_count,
            strategy = self.strategy.name(),
            "Aggregated ticker sentiment"
        );
        result
    }

    /// Aggregate every ticker that appears in `articles`.
    pub fn aggregate_all(
        &self,
        articles: &[ArticleSentiment],
        now: DateTime<Utc>,
    ) -> BTreeMap<String, TickerSentiment> {
        let mut grouped: BTreeMap<String, Vec<ArticleSentiment>> = BTreeMap::new();
        for article in articles {
            grouped
                .entry(normalize_ticker(&article.ticker))
                .or_default()
                .push(article.clone());
        }

        grouped
            .into_iter()
            .map(|(ticker, group)| {
                let sentiment = self.aggregate(&ticker, &group, now);
                (ticker, sentiment)
            })
            .collect()
    }
}

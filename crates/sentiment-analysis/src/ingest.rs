//! Ingestion of upstream classifier output.
//!
//! Out-of-range records are excluded here, never clamped: a bad score or
//! confidence means the upstream classifier is broken, and clamping would hide
//! that.

use analysis_core::{
    normalize_ticker, ArticleSentiment, ClassProbabilities, ScoreMapping, SentimentLabel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Classifier output as handed over by the upstream sentiment stage.
///
/// `score` may be absent, in which case it is derived from the label (or the
/// full class probabilities) with the configured [`ScoreMapping`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticleSentiment {
    pub ticker: String,
    #[serde(default)]
    pub label: Option<SentimentLabel>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub probabilities: Option<ClassProbabilities>,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Why a record was excluded from aggregation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestRejection {
    #[error("ticker is empty")]
    EmptyTicker,

    #[error("no label and no class probabilities")]
    MissingLabel,

    #[error("label given without confidence")]
    MissingConfidence,

    #[error("class probabilities outside [0, 1]")]
    InvalidProbabilities,

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("score {0} outside [-1, 1]")]
    ScoreOutOfRange(f64),

    #[error("published {hours_ahead:.2}h in the future")]
    FutureTimestamp { hours_ahead: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedArticle {
    pub ticker: String,
    pub source: String,
    pub reason: IngestRejection,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub accepted: Vec<ArticleSentiment>,
    pub rejected: Vec<RejectedArticle>,
}

impl IngestReport {
    /// Accepted records grouped by ticker.
    pub fn by_ticker(&self) -> BTreeMap<String, Vec<ArticleSentiment>> {
        let mut grouped: BTreeMap<String, Vec<ArticleSentiment>> = BTreeMap::new();
        for article in &self.accepted {
            grouped
                .entry(article.ticker.clone())
                .or_default()
                .push(article.clone());
        }
        grouped
    }
}

/// Range checks every materialized record must pass before it is aggregated.
pub fn validate_article(article: &ArticleSentiment, now: DateTime<Utc>) -> Result<(), IngestRejection> {
    if article.ticker.trim().is_empty() {
        return Err(IngestRejection::EmptyTicker);
    }
    if !is_confidence(article.confidence) {
        return Err(IngestRejection::ConfidenceOutOfRange(article.confidence));
    }
    if !is_score(article.score) {
        return Err(IngestRejection::ScoreOutOfRange(article.score));
    }
    let age = article.age_hours(now);
    if age < 0.0 {
        return Err(IngestRejection::FutureTimestamp { hours_ahead: -age });
    }
    Ok(())
}

fn is_confidence(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn is_score(value: f64) -> bool {
    value.is_finite() && (-1.0..=1.0).contains(&value)
}

/// Turns raw classifier records into validated [`ArticleSentiment`] values.
#[derive(Clone)]
pub struct ArticleIngestor {
    mapping: Arc<dyn ScoreMapping>,
}

impl ArticleIngestor {
    pub fn new(mapping: Arc<dyn ScoreMapping>) -> Self {
        Self { mapping }
    }

    pub fn mapping_name(&self) -> &str {
        self.mapping.name()
    }

    pub fn resolve(
        &self,
        raw: &RawArticleSentiment,
        now: DateTime<Utc>,
    ) -> Result<ArticleSentiment, IngestRejection> {
        let ticker = normalize_ticker(&raw.ticker);
        if ticker.is_empty() {
            return Err(IngestRejection::EmptyTicker);
        }

        if let Some(probs) = &raw.probabilities {
            if !probs.is_valid() {
                return Err(IngestRejection::InvalidProbabilities);
            }
        }

        let (label, confidence) = match (raw.label, raw.confidence, &raw.probabilities) {
            (Some(label), Some(confidence), _) => (label, confidence),
            (Some(_), None, None) => return Err(IngestRejection::MissingConfidence),
            (Some(label), None, Some(probs)) => (label, probs.probability(label)),
            (None, confidence, Some(probs)) => {
                let (label, top) = probs.classify();
                (label, confidence.unwrap_or(top))
            }
            (None, _, None) => return Err(IngestRejection::MissingLabel),
        };

        if !is_confidence(confidence) {
            return Err(IngestRejection::ConfidenceOutOfRange(confidence));
        }

        let score = match (raw.score, &raw.probabilities) {
            (Some(score), _) => score,
            (None, Some(probs)) if raw.label.is_none() => self.mapping.score_probabilities(probs),
            (None, _) => self.mapping.score(label, confidence),
        };

        let article = ArticleSentiment {
            ticker,
            label,
            score,
            confidence,
            source: raw.source.trim().to_string(),
            published_at: raw.published_at,
        };
        validate_article(&article, now)?;
        Ok(article)
    }

    pub fn ingest<I>(&self, records: I, now: DateTime<Utc>) -> IngestReport
    where
        I: IntoIterator<Item = RawArticleSentiment>,
    {
        let mut report = IngestReport::default();
        for raw in records {
            match self.resolve(&raw, now) {
                Ok(article) => report.accepted.push(article),
                Err(reason) => {
                    tracing::warn!(
                        ticker = %raw.ticker,
                        source = %raw.source,
                        "Rejected article sentiment: {}",
                        reason
                    );
                    report.rejected.push(RejectedArticle {
                        ticker: normalize_ticker(&raw.ticker),
                        source: raw.source,
                        reason,
                    });
                }
            }
        }
        tracing::debug!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            mapping = self.mapping.name(),
            "Ingested article sentiments"
        );
        report
    }
}

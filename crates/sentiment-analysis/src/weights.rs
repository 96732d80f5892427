//! Recency and source-credibility weight tables.
//!
//! A [`WeightTable`] is immutable once built and is shared read-only across
//! every ticker aggregation in a run.

use analysis_core::{AnalysisError, ArticleSentiment, WeightedContribution};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const SOURCE_PREFIXES: &[&str] = &["https://", "http://", "www.", "the "];
const SOURCE_SUFFIXES: &[&str] = &[
    "/", ".com", ".co.uk", ".net", ".org", " news", " inc.", " inc", ".",
];

/// Upper edge (exclusive) of one recency step and the weight applied below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyBucket {
    pub max_age_hours: f64,
    pub weight: f64,
}

impl RecencyBucket {
    pub fn new(max_age_hours: f64, weight: f64) -> Self {
        Self {
            max_age_hours,
            weight,
        }
    }
}

/// Lookup configuration for article weighting.
#[derive(Debug, Clone)]
pub struct WeightTable {
    recency: Vec<RecencyBucket>,
    credibility: HashMap<String, f64>,
    default_credibility: f64,
}

impl WeightTable {
    /// Build a validated table.
    ///
    /// Buckets must be ordered by strictly increasing age edge with weights in
    /// [0, 1] that never increase. Credibility keys are normalized with
    /// [`normalize_source`].
    pub fn new<I, S>(
        recency: Vec<RecencyBucket>,
        credibility: I,
        default_credibility: f64,
    ) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        if recency.is_empty() {
            return Err(AnalysisError::Configuration(
                "recency table must have at least one bucket".to_string(),
            ));
        }

        let mut previous_edge = 0.0;
        let mut previous_weight = 1.0;
        for bucket in &recency {
            if !bucket.max_age_hours.is_finite() || bucket.max_age_hours <= previous_edge {
                return Err(AnalysisError::Configuration(format!(
                    "recency bucket edges must be finite and strictly increasing (got {}h after {}h)",
                    bucket.max_age_hours, previous_edge
                )));
            }
            if !is_unit_weight(bucket.weight) {
                return Err(AnalysisError::Configuration(format!(
                    "recency weight {} for <{}h is outside [0, 1]",
                    bucket.weight, bucket.max_age_hours
                )));
            }
            if bucket.weight > previous_weight {
                return Err(AnalysisError::Configuration(format!(
                    "recency weights must not increase with age ({} after {})",
                    bucket.weight, previous_weight
                )));
            }
            previous_edge = bucket.max_age_hours;
            previous_weight = bucket.weight;
        }

        if !is_unit_weight(default_credibility) {
            return Err(AnalysisError::Configuration(format!(
                "default credibility weight {} is outside [0, 1]",
                default_credibility
            )));
        }

        let mut table = HashMap::new();
        for (source, weight) in credibility {
            let key = normalize_source(source.as_ref());
            if key.is_empty() {
                return Err(AnalysisError::Configuration(format!(
                    "credibility source name '{}' is empty after normalization",
                    source.as_ref()
                )));
            }
            if !is_unit_weight(weight) {
                return Err(AnalysisError::Configuration(format!(
                    "credibility weight {} for '{}' is outside [0, 1]",
                    weight, key
                )));
            }
            table.insert(key, weight);
        }

        Ok(Self {
            recency,
            credibility: table,
            default_credibility,
        })
    }

    /// Articles at or beyond this age get zero recency weight.
    pub fn window_hours(&self) -> f64 {
        self.recency
            .last()
            .map(|b| b.max_age_hours)
            .unwrap_or(0.0)
    }

    pub fn default_credibility(&self) -> f64 {
        self.default_credibility
    }

    /// Piecewise-constant recency weight. Lower bucket edges are closed, so an
    /// article exactly 6h old lands in the [6, 12) bucket.
    ///
    /// Negative or non-finite ages get 0.0.
    pub fn recency_weight(&self, age_hours: f64) -> f64 {
        if !age_hours.is_finite() || age_hours < 0.0 {
            return 0.0;
        }
        self.recency
            .iter()
            .find(|b| age_hours < b.max_age_hours)
            .map(|b| b.weight)
            .unwrap_or(0.0)
    }

    /// Exact lookup on the normalized publisher name, default for unknown names.
    pub fn credibility_weight(&self, source: &str) -> f64 {
        self.credibility
            .get(&normalize_source(source))
            .copied()
            .unwrap_or(self.default_credibility)
    }

    pub fn contribution(&self, article: &ArticleSentiment, now: DateTime<Utc>) -> WeightedContribution {
        let recency_weight = self.recency_weight(article.age_hours(now));
        let credibility_weight = self.credibility_weight(&article.source);
        let combined_weight =
            (recency_weight * credibility_weight * article.confidence).clamp(0.0, 1.0);
        WeightedContribution {
            recency_weight,
            credibility_weight,
            combined_weight,
        }
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            recency: vec![
                RecencyBucket::new(6.0, 1.0),
                RecencyBucket::new(12.0, 0.8),
                RecencyBucket::new(24.0, 0.6),
            ],
            credibility: [("reuters", 1.0), ("bloomberg", 0.95), ("cnbc", 0.85)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            default_credibility: 0.6,
        }
    }
}

fn is_unit_weight(weight: f64) -> bool {
    weight.is_finite() && (0.0..=1.0).contains(&weight)
}

/// Case-fold a publisher name and strip common decorations, so "Reuters",
/// "reuters.com" and "www.Reuters.com" all resolve to "reuters".
pub fn normalize_source(source: &str) -> String {
    let mut name = source
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    loop {
        let before = name.len();
        for prefix in SOURCE_PREFIXES {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest.to_string();
            }
        }
        for suffix in SOURCE_SUFFIXES {
            if let Some(rest) = name.strip_suffix(suffix) {
                name = rest.to_string();
            }
        }
        name = name.trim().to_string();
        if name.len() == before {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::SentimentLabel;
    use chrono::Duration;

    #[test]
    fn test_recency_buckets_closed_on_lower_bound() {
        let table = WeightTable::default();
        assert_eq!(table.recency_weight(0.0), 1.0);
        assert_eq!(table.recency_weight(5.999), 1.0);
        assert_eq!(table.recency_weight(6.0), 0.8);
        assert_eq!(table.recency_weight(11.99), 0.8);
        assert_eq!(table.recency_weight(12.0), 0.6);
        assert_eq!(table.recency_weight(23.99), 0.6);
        assert_eq!(table.recency_weight(24.0), 0.0);
        assert_eq!(table.recency_weight(1000.0), 0.0);
    }

    #[test]
    fn test_recency_is_total() {
        let table = WeightTable::default();
        assert_eq!(table.recency_weight(-1.0), 0.0);
        assert_eq!(table.recency_weight(f64::NAN), 0.0);
        assert_eq!(table.recency_weight(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_recency_monotonic_non_increasing() {
        let table = WeightTable::default();
        let mut previous = table.recency_weight(0.0);
        for tenth_hours in 1..400 {
            let w = table.recency_weight(tenth_hours as f64 / 10.0);
            assert!(w <= previous, "weight rose at {}h", tenth_hours as f64 / 10.0);
            previous = w;
        }
    }

    #[test]
    fn test_credibility_lookup_normalizes_names() {
        let table = WeightTable::default();
        assert_eq!(table.credibility_weight("Reuters"), 1.0);
        assert_eq!(table.credibility_weight("reuters.com"), 1.0);
        assert_eq!(table.credibility_weight("  www.Reuters.com/ "), 1.0);
        assert_eq!(table.credibility_weight("Bloomberg News"), 0.95);
        assert_eq!(table.credibility_weight("CNBC"), 0.85);
    }

    #[test]
    fn test_credibility_is_exact_not_fuzzy() {
        let table = WeightTable::default();
        assert_eq!(table.credibility_weight("Reuters Breakingviews"), 0.6);
        assert_eq!(table.credibility_weight("Yahoo Finance"), 0.6);
        assert_eq!(table.credibility_weight(""), 0.6);
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("The Wall Street  Journal"), "wall street journal");
        assert_eq!(normalize_source("https://www.cnbc.com/"), "cnbc");
        assert_eq!(normalize_source("Benzinga"), "benzinga");
    }

    #[test]
    fn test_rejects_increasing_recency_weights() {
        let result = WeightTable::new(
            vec![RecencyBucket::new(6.0, 0.5), RecencyBucket::new(12.0, 0.9)],
            Vec::<(String, f64)>::new(),
            0.6,
        );
        assert!(matches!(result, Err(AnalysisError::Configuration(_))));
    }

    #[test]
    fn test_rejects_out_of_range_weights() {
        assert!(WeightTable::new(
            vec![RecencyBucket::new(24.0, 1.0)],
            vec![("reuters", 1.2)],
            0.6
        )
        .is_err());
        assert!(WeightTable::new(
            vec![RecencyBucket::new(24.0, 1.0)],
            Vec::<(&str, f64)>::new(),
            -0.1
        )
        .is_err());
        assert!(WeightTable::new(
            vec![RecencyBucket::new(12.0, 1.0), RecencyBucket::new(12.0, 0.5)],
            Vec::<(&str, f64)>::new(),
            0.6
        )
        .is_err());
    }

    #[test]
    fn test_custom_table_overrides() {
        let table = WeightTable::new(
            vec![RecencyBucket::new(48.0, 0.9)],
            vec![("Financial Times", 0.9)],
            0.3,
        )
        .unwrap();
        assert_eq!(table.window_hours(), 48.0);
        assert_eq!(table.recency_weight(30.0), 0.9);
        assert_eq!(table.credibility_weight("financial times"), 0.9);
        assert_eq!(table.credibility_weight("Reuters"), 0.3);
    }

    #[test]
    fn test_contribution_product() {
        let now = Utc::now();
        let article = ArticleSentiment {
            ticker: "AAPL".to_string(),
            label: SentimentLabel::Negative,
            score: -1.0,
            confidence: 0.78,
            source: "CNBC".to_string(),
            published_at: now - Duration::hours(8),
        };
        let c = WeightTable::default().contribution(&article, now);
        assert_eq!(c.recency_weight, 0.8);
        assert_eq!(c.credibility_weight, 0.85);
        approx::assert_abs_diff_eq!(c.combined_weight, 0.8 * 0.85 * 0.78, epsilon = 1e-12);
    }
}

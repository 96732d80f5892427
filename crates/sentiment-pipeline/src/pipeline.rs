use analysis_core::{
    normalize_ticker, AnalysisError, PortfolioHolding, PortfolioReport, TickerSentiment,
};
use chrono::{DateTime, Utc};
use portfolio_manager::{Portfolio, PortfolioAggregator, UserPortfolio};
use risk_manager::RiskClassifier;
use sentiment_analysis::{ArticleIngestor, RawArticleSentiment, TickerAggregator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PipelineConfig;

/// Everything one user's run consumes, already fetched and classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRunInput {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub holdings: Vec<PortfolioHolding>,
    #[serde(default)]
    pub articles: Vec<RawArticleSentiment>,
}

impl UserRunInput {
    /// Pair an imported portfolio with the shared article pool, keeping only
    /// articles about tickers the user holds.
    pub fn from_portfolio(portfolio: UserPortfolio, articles: &[RawArticleSentiment]) -> Self {
        let held: Vec<&str> = portfolio.holdings.iter().map(|h| h.ticker.as_str()).collect();
        let articles = articles
            .iter()
            .filter(|a| held.contains(&normalize_ticker(&a.ticker).as_str()))
            .cloned()
            .collect();
        Self {
            user_id: portfolio.user_id,
            email: portfolio.email,
            holdings: portfolio.holdings,
            articles,
        }
    }
}

/// Pure per-user computation: ingest, aggregate per ticker, aggregate the
/// portfolio, classify risk. No I/O; safe to share across threads.
pub struct SentimentPipeline {
    ingestor: ArticleIngestor,
    tickers: TickerAggregator,
    portfolio: PortfolioAggregator,
    risk: RiskClassifier,
    normalize_weights: bool,
}

impl SentimentPipeline {
    pub fn new(
        ingestor: ArticleIngestor,
        tickers: TickerAggregator,
        risk: RiskClassifier,
        normalize_weights: bool,
    ) -> Self {
        Self {
            ingestor,
            tickers,
            portfolio: PortfolioAggregator::new(),
            risk,
            normalize_weights,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, AnalysisError> {
        let weights = Arc::new(config.weight_table()?);
        let tickers =
            TickerAggregator::with_strategy(weights, config.aggregation_method.strategy());
        let ingestor = ArticleIngestor::new(config.score_mapping.build());
        Ok(Self::new(
            ingestor,
            tickers,
            config.risk_classifier()?,
            config.normalize_portfolio_weights,
        ))
    }

    fn build_portfolio(&self, input: &UserRunInput) -> Result<(Portfolio, bool), AnalysisError> {
        if self.normalize_weights {
            Portfolio::normalized(input.holdings.clone())
        } else {
            Portfolio::new(input.holdings.clone()).map(|p| (p, false))
        }
    }

    /// Run one user. Portfolio validation happens before any article is
    /// looked at, so a bad portfolio never yields a partial report.
    pub fn run_user(
        &self,
        input: &UserRunInput,
        now: DateTime<Utc>,
    ) -> Result<PortfolioReport, AnalysisError> {
        let (portfolio, weights_normalized) = self.build_portfolio(input).map_err(|e| {
            tracing::warn!(user_id = input.user_id, "Portfolio rejected: {}", e);
            e
        })?;

        let ingest = self.ingestor.ingest(input.articles.iter().cloned(), now);
        let grouped = ingest.by_ticker();

        let mut sentiments: BTreeMap<String, TickerSentiment> = BTreeMap::new();
        for ticker in portfolio.tickers() {
            let articles = grouped.get(ticker).map(Vec::as_slice).unwrap_or(&[]);
            sentiments.insert(ticker.to_string(), self.tickers.aggregate(ticker, articles, now));
        }

        let ignored: usize = grouped
            .iter()
            .filter(|(ticker, _)| !sentiments.contains_key(*ticker))
            .map(|(_, articles)| articles.len())
            .sum();
        if ignored > 0 {
            tracing::debug!(
                user_id = input.user_id,
                ignored,
                "Articles for tickers not in the portfolio"
            );
        }

        let portfolio_sentiment = self.portfolio.portfolio_sentiment(&portfolio, &sentiments);
        let risk = self.risk.assess(portfolio.holdings(), &sentiments);

        tracing::info!(
            user_id = input.user_id,
            tickers = portfolio.len(),
            portfolio_sentiment,
            risk_level = %risk.level,
            rejected = ingest.rejected.len(),
            "Portfolio run complete"
        );

        Ok(PortfolioReport {
            user_id: input.user_id,
            email: input.email.clone(),
            as_of: now,
            tickers: self.portfolio.resolve_tickers(&portfolio, &sentiments),
            portfolio: portfolio.holdings().to_vec(),
            portfolio_sentiment,
            risk,
            rejected_articles: ingest.rejected.len(),
            weights_normalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{ActionSignal, RiskLevel, SentimentLabel};
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn raw(
        ticker: &str,
        score: f64,
        confidence: f64,
        hours_ago: i64,
        source: &str,
    ) -> RawArticleSentiment {
        let label = if score >= 0.0 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        };
        RawArticleSentiment {
            ticker: ticker.to_string(),
            label: Some(label),
            confidence: Some(confidence),
            score: Some(score),
            probabilities: None,
            source: source.to_string(),
            published_at: now() - Duration::hours(hours_ago),
        }
    }

    fn pipeline() -> SentimentPipeline {
        SentimentPipeline::from_config(&PipelineConfig::default()).unwrap()
    }

    fn input(holdings: &[(&str, f64)], articles: Vec<RawArticleSentiment>) -> UserRunInput {
        UserRunInput {
            user_id: 1,
            email: Some("alice@example.com".to_string()),
            holdings: holdings.iter().map(|(t, w)| PortfolioHolding::new(t, *w)).collect(),
            articles,
        }
    }

    #[test]
    fn test_full_run() {
        let report = pipeline()
            .run_user(
                &input(
                    &[("AAPL", 0.6), ("MSFT", 0.4)],
                    vec![
                        raw("AAPL", 0.8, 0.9, 2, "Reuters"),
                        raw("msft", -0.4, 0.7, 3, "CNBC"),
                        raw("GME", 1.0, 1.0, 1, "Reuters"),
                    ],
                ),
                now(),
            )
            .unwrap();

        assert_eq!(report.tickers.len(), 2);
        assert_abs_diff_eq!(report.tickers[0].sentiment, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(report.tickers[1].sentiment, -0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(report.portfolio_sentiment, 0.8 * 0.6 - 0.4 * 0.4, epsilon = 1e-12);

        let expected_risk = 0.8 * 0.6 * (1.0 - 0.9) + 0.4 * 0.4 * (1.0 - 0.7);
        assert_abs_diff_eq!(report.risk.risk_score, expected_risk, epsilon = 1e-12);
        assert_eq!(report.risk.level, RiskLevel::Low);
        assert_eq!(report.risk.signal, ActionSignal::Hold);
        assert_eq!(report.rejected_articles, 0);
        assert!(!report.weights_normalized);
    }

    #[test]
    fn test_bad_weights_abort_before_aggregation() {
        let err = pipeline()
            .run_user(&input(&[("AAPL", 0.5), ("MSFT", 0.4)], vec![]), now())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_normalization_is_flagged() {
        let config = PipelineConfig {
            normalize_portfolio_weights: true,
            ..PipelineConfig::default()
        };
        let report = SentimentPipeline::from_config(&config)
            .unwrap()
            .run_user(&input(&[("AAPL", 0.5), ("MSFT", 0.4)], vec![]), now())
            .unwrap();
        assert!(report.weights_normalized);
        let total: f64 = report.portfolio.iter().map(|h| h.weight).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_holding_without_news_is_neutral() {
        let report = pipeline()
            .run_user(
                &input(&[("AAPL", 0.5), ("NVDA", 0.5)], vec![raw("AAPL", 0.6, 0.8, 1, "Bloomberg")]),
                now(),
            )
            .unwrap();
        assert_eq!(report.tickers[1], TickerSentiment::neutral("NVDA"));
        assert_abs_diff_eq!(report.portfolio_sentiment, 0.3, epsilon = 1e-12);
        assert_eq!(report.risk.per_ticker_risk["NVDA"], RiskLevel::Low);
    }

    #[test]
    fn test_invalid_articles_counted_not_aggregated() {
        let report = pipeline()
            .run_user(
                &input(
                    &[("AAPL", 1.0)],
                    vec![raw("AAPL", 0.5, 0.9, 1, "Reuters"), raw("AAPL", 1.7, 0.9, 1, "Reuters")],
                ),
                now(),
            )
            .unwrap();
        assert_eq!(report.rejected_articles, 1);
        assert_eq!(report.tickers[0].article_count, 1);
        assert_abs_diff_eq!(report.tickers[0].sentiment, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_from_portfolio_keeps_held_tickers_only() {
        let portfolio = UserPortfolio {
            user_id: 4,
            email: None,
            holdings: vec![PortfolioHolding::new("AAPL", 1.0)],
        };
        let pool = vec![raw("aapl", 0.2, 0.9, 1, "Reuters"), raw("TSLA", 0.2, 0.9, 1, "Reuters")];
        let input = UserRunInput::from_portfolio(portfolio, &pool);
        assert_eq!(input.articles.len(), 1);
        assert_eq!(input.user_id, 4);
    }

    #[test]
    fn test_run_input_from_json() {
        let json = r#"{
            "user_id": 9,
            "holdings": [{"ticker": "aapl", "weight": 1.0}],
            "articles": [{
                "ticker": "AAPL",
                "label": "negative",
                "confidence": 0.6,
                "source": "www.reuters.com",
                "published_at": "2024-05-01T10:00:00Z"
            }]
        }"#;
        let input: UserRunInput = serde_json::from_str(json).unwrap();
        assert!(input.email.is_none());

        let report = pipeline().run_user(&input, now()).unwrap();
        // Score derived from the label: -(0.5 + 0.5 * 0.6)
        assert_abs_diff_eq!(report.tickers[0].sentiment, -0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(report.tickers[0].confidence, 0.6, epsilon = 1e-12);
    }
}

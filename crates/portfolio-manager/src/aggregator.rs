use analysis_core::stats::clamp_or;
use analysis_core::{normalize_ticker, AnalysisError, PortfolioHolding, TickerSentiment};
use std::collections::BTreeMap;

use crate::portfolio::Portfolio;

/// Combines per-ticker sentiment into one portfolio-level figure.
///
/// Holdings without a [`TickerSentiment`] count as neutral with zero
/// confidence: their weight stays in the portfolio but contributes no signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioAggregator;

impl PortfolioAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Σ sentiment × weight over the portfolio, clamped to [-1, 1].
    pub fn portfolio_sentiment(
        &self,
        portfolio: &Portfolio,
        sentiments: &BTreeMap<String, TickerSentiment>,
    ) -> f64 {
        let total: f64 = portfolio
            .holdings()
            .iter()
            .map(|h| {
                sentiments
                    .get(&h.ticker)
                    .map(|s| s.sentiment * h.weight)
                    .unwrap_or(0.0)
            })
            .sum();
        clamp_or(total, -1.0, 1.0, 0.0)
    }

    /// Validate raw holdings, then aggregate. Bad weights fail before any
    /// sentiment is touched.
    pub fn aggregate_holdings(
        &self,
        holdings: Vec<PortfolioHolding>,
        sentiments: &BTreeMap<String, TickerSentiment>,
    ) -> Result<f64, AnalysisError> {
        let portfolio = Portfolio::new(holdings)?;
        Ok(self.portfolio_sentiment(&portfolio, sentiments))
    }

    /// One [`TickerSentiment`] per holding, in portfolio order, with missing
    /// tickers filled in as neutral.
    pub fn resolve_tickers(
        &self,
        portfolio: &Portfolio,
        sentiments: &BTreeMap<String, TickerSentiment>,
    ) -> Vec<TickerSentiment> {
        portfolio
            .tickers()
            .map(|ticker| {
                sentiments.get(ticker).cloned().unwrap_or_else(|| {
                    tracing::info!(ticker = %ticker, "No sentiment for holding, treating as neutral");
                    TickerSentiment::neutral(normalize_ticker(ticker))
                })
            })
            .collect()
    }
}

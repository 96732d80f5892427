use analysis_core::{normalize_ticker, AnalysisError, PortfolioHolding};
use std::collections::HashSet;

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// A validated set of holdings whose weights sum to 1.0 within [`WEIGHT_TOLERANCE`].
///
/// The only ways to build one are [`Portfolio::new`], which rejects bad sums,
/// and [`Portfolio::normalized`], which rescales and says so. Aggregation takes
/// a `&Portfolio`, so unvalidated weights never reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    holdings: Vec<PortfolioHolding>,
}

impl Portfolio {
    pub fn new(holdings: Vec<PortfolioHolding>) -> Result<Self, AnalysisError> {
        let holdings = canonical_holdings(holdings)?;
        let total = weight_sum(&holdings);
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AnalysisError::Configuration(format!(
                "portfolio weights sum to {:.6}, expected 1.0 ± {}",
                total, WEIGHT_TOLERANCE
            )));
        }
        Ok(Self { holdings })
    }

    /// Rescale weights to sum to 1.0. All-zero weights become equal weights.
    ///
    /// Returns the portfolio and whether any rescaling happened. Per-holding
    /// editing rules are still enforced.
    pub fn normalized(holdings: Vec<PortfolioHolding>) -> Result<(Self, bool), AnalysisError> {
        let mut holdings = canonical_holdings(holdings)?;
        let total = weight_sum(&holdings);
        if (total - 1.0).abs() <= WEIGHT_TOLERANCE {
            return Ok((Self { holdings }, false));
        }

        if total <= 0.0 {
            let equal = 1.0 / holdings.len() as f64;
            for holding in &mut holdings {
                holding.weight = equal;
            }
        } else {
            for holding in &mut holdings {
                holding.weight /= total;
            }
        }

        tracing::warn!(
            holdings = holdings.len(),
            original_sum = total,
            "Portfolio weights rescaled to sum to 1.0"
        );
        Ok((Self { holdings }, true))
    }

    pub fn holdings(&self) -> &[PortfolioHolding] {
        &self.holdings
    }

    pub fn weight_of(&self, ticker: &str) -> Option<f64> {
        let ticker = normalize_ticker(ticker);
        self.holdings
            .iter()
            .find(|h| h.ticker == ticker)
            .map(|h| h.weight)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|h| h.ticker.as_str())
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

pub fn weight_sum(holdings: &[PortfolioHolding]) -> f64 {
    holdings.iter().map(|h| h.weight).sum()
}

/// Per-holding rules: non-empty ticker, finite weight in [0, 1], no duplicates.
pub fn validate_holdings(holdings: &[PortfolioHolding]) -> Result<(), AnalysisError> {
    if holdings.is_empty() {
        return Err(AnalysisError::Configuration(
            "portfolio has no holdings".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for holding in holdings {
        let ticker = normalize_ticker(&holding.ticker);
        if ticker.is_empty() {
            return Err(AnalysisError::Configuration(
                "portfolio holding has an empty ticker".to_string(),
            ));
        }
        if !holding.weight.is_finite() || !(0.0..=1.0).contains(&holding.weight) {
            return Err(AnalysisError::Configuration(format!(
                "weight for {} must be between 0 and 1, got {}",
                ticker, holding.weight
            )));
        }
        if !seen.insert(ticker.clone()) {
            return Err(AnalysisError::Configuration(format!(
                "ticker {} appears more than once in the portfolio",
                ticker
            )));
        }
    }
    Ok(())
}

fn canonical_holdings(holdings: Vec<PortfolioHolding>) -> Result<Vec<PortfolioHolding>, AnalysisError> {
    let holdings: Vec<PortfolioHolding> = holdings
        .into_iter()
        .map(|h| PortfolioHolding::new(h.ticker, h.weight))
        .collect();
    validate_holdings(&holdings)?;
    Ok(holdings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn holdings(weights: &[(&str, f64)]) -> Vec<PortfolioHolding> {
        weights.iter().map(|(t, w)| PortfolioHolding::new(t, *w)).collect()
    }

    #[test]
    fn test_accepts_sum_within_tolerance() {
        assert!(Portfolio::new(holdings(&[("AAPL", 0.6), ("MSFT", 0.4)])).is_ok());
        assert!(Portfolio::new(holdings(&[("AAPL", 0.5), ("MSFT", 0.5000005)])).is_ok());
        let thirds = Portfolio::new(holdings(&[("A", 1.0 / 3.0), ("B", 1.0 / 3.0), ("C", 1.0 / 3.0)]));
        assert!(thirds.is_ok());
    }

    #[test]
    fn test_rejects_bad_sums() {
        for weights in [
            vec![("AAPL", 0.5), ("MSFT", 0.4)],
            vec![("AAPL", 0.6), ("MSFT", 0.5)],
            vec![("AAPL", 0.5), ("MSFT", 0.50001)],
        ] {
            let err = Portfolio::new(holdings(&weights)).unwrap_err();
            assert!(err.is_configuration(), "expected configuration error, got {err:?}");
        }
    }

    #[test]
    fn test_rejects_invalid_holdings() {
        assert!(Portfolio::new(vec![]).is_err());
        assert!(Portfolio::new(holdings(&[("AAPL", -0.2), ("MSFT", 1.2)])).is_err());
        assert!(Portfolio::new(holdings(&[("AAPL", f64::NAN)])).is_err());
        assert!(Portfolio::new(holdings(&[("  ", 1.0)])).is_err());
        assert!(Portfolio::new(holdings(&[("aapl", 0.5), ("AAPL ", 0.5)])).is_err());
    }

    #[test]
    fn test_normalized_rescales_and_flags() {
        let (portfolio, rescaled) =
            Portfolio::normalized(holdings(&[("AAPL", 0.3), ("MSFT", 0.3)])).unwrap();
        assert!(rescaled);
        assert_abs_diff_eq!(portfolio.weight_of("aapl").unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(weight_sum(portfolio.holdings()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_leaves_valid_portfolio_alone() {
        let input = holdings(&[("AAPL", 0.7), ("MSFT", 0.3)]);
        let (portfolio, rescaled) = Portfolio::normalized(input.clone()).unwrap();
        assert!(!rescaled);
        assert_eq!(portfolio.holdings(), input.as_slice());
    }

    #[test]
    fn test_normalized_zero_weights_become_equal() {
        let (portfolio, rescaled) =
            Portfolio::normalized(holdings(&[("AAPL", 0.0), ("MSFT", 0.0), ("NVDA", 0.0), ("TSLA", 0.0)]))
                .unwrap();
        assert!(rescaled);
        for ticker in ["AAPL", "MSFT", "NVDA", "TSLA"] {
            assert_eq!(portfolio.weight_of(ticker), Some(0.25));
        }
    }

    #[test]
    fn test_normalized_still_rejects_duplicates() {
        assert!(Portfolio::normalized(holdings(&[("AAPL", 0.3), ("aapl", 0.3)])).is_err());
    }
}

use analysis_core::PortfolioReport;
use async_trait::async_trait;

use crate::{NotificationError, ReportChannel};

/// Writes the report summary to the tracing log instead of sending it.
pub struct LogNotifier;

#[async_trait]
impl ReportChannel for LogNotifier {
    async fn deliver(&self, report: &PortfolioReport) -> Result<(), NotificationError> {
        tracing::info!(
            user_id = report.user_id,
            portfolio_sentiment = report.portfolio_sentiment,
            risk_level = %report.risk.level,
            signal = %report.risk.signal,
            tickers = report.tickers.len(),
            "Portfolio report ready"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

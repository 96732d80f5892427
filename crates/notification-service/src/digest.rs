use analysis_core::PortfolioReport;
use std::fmt::Write;

/// Coarse wording for a sentiment value, tuned so small moves still show.
pub fn sentiment_label(score: f64) -> &'static str {
    match score {
        s if s >= 0.3 => "Very Positive",
        s if s >= 0.1 => "Positive",
        s if s >= 0.02 => "Slightly Positive",
        s if s <= -0.3 => "Very Negative",
        s if s <= -0.1 => "Negative",
        s if s <= -0.02 => "Slightly Negative",
        _ => "Neutral",
    }
}

/// Plain-text rendering of a [`PortfolioReport`].
pub struct ReportDigest;

impl ReportDigest {
    pub fn subject(report: &PortfolioReport) -> String {
        format!(
            "Portfolio Sentiment Report - {}",
            report.as_of.format("%Y-%m-%d")
        )
    }

    pub fn render(report: &PortfolioReport) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Portfolio Sentiment Report");
        let _ = writeln!(text, "Date: {}", report.as_of.format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(
            text,
            "Portfolio Risk Level: {} ({})",
            report.risk.level.as_str().to_uppercase(),
            report.risk.signal.as_str().to_uppercase()
        );
        let _ = writeln!(
            text,
            "Portfolio Sentiment: {} ({:+.2})",
            sentiment_label(report.portfolio_sentiment),
            report.portfolio_sentiment
        );
        let _ = writeln!(text, "{}", report.risk.reason);
        if report.weights_normalized {
            let _ = writeln!(text, "Note: portfolio weights were rescaled to sum to 100%.");
        }

        let _ = writeln!(text);
        let _ = writeln!(text, "Portfolio Overview:");
        for holding in &report.portfolio {
            let ticker = report.tickers.iter().find(|t| t.ticker == holding.ticker);
            let risk = report
                .risk
                .per_ticker_risk
                .get(&holding.ticker)
                .map(|l| l.as_str().to_uppercase())
                .unwrap_or_else(|| "N/A".to_string());

            let _ = writeln!(text);
            let _ = writeln!(text, "{}:", holding.ticker);
            let _ = writeln!(text, "  Weight: {:.1}%", holding.weight * 100.0);
            match ticker {
                Some(t) if t.article_count > 0 => {
                    let _ = writeln!(
                        text,
                        "  Sentiment: {} ({:+.2}, confidence {:.0}%, {} articles)",
                        sentiment_label(t.sentiment),
                        t.sentiment,
                        t.confidence * 100.0,
                        t.article_count
                    );
                }
                _ => {
                    let _ = writeln!(text, "  Sentiment: Neutral (no recent articles)");
                }
            }
            let _ = writeln!(text, "  Risk: {}", risk);
        }

        if report.rejected_articles > 0 {
            let _ = writeln!(text);
            let _ = writeln!(
                text,
                "{} article(s) were excluded because they failed validation.",
                report.rejected_articles
            );
        }

        text.push_str("\n---\nThis is an automated portfolio sentiment report.\n");
        text
    }
}

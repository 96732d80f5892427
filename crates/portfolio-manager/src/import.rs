use analysis_core::PortfolioHolding;
use anyhow::{anyhow, Context, Result};

use crate::models::UserPortfolio;

/// Parse `email,ticker,weight` rows into one portfolio per e-mail address.
///
/// Users are numbered from 1 in order of first appearance. Rows without an
/// e-mail or ticker are skipped; an unparseable weight fails the import.
/// Weight sums are not checked here; that happens when the pipeline builds a
/// [`crate::Portfolio`].
pub fn parse_portfolio_csv(csv_data: &str) -> Result<Vec<UserPortfolio>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let mut users: Vec<UserPortfolio> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = result.with_context(|| format!("reading portfolio CSV line {}", line))?;

        let email = record.get(0).unwrap_or("").to_lowercase();
        let ticker = record.get(1).unwrap_or("");
        if email.is_empty() || ticker.is_empty() {
            tracing::warn!(line, "Skipping portfolio row without email or ticker");
            continue;
        }

        let raw_weight = record.get(2).unwrap_or("");
        let weight: f64 = raw_weight
            .parse()
            .map_err(|_| anyhow!("line {}: weight '{}' is not a number", line, raw_weight))?;

        let holding = PortfolioHolding::new(ticker, weight);
        match users.iter_mut().find(|u| u.email.as_deref() == Some(email.as_str())) {
            Some(user) => user.holdings.push(holding),
            None => users.push(UserPortfolio {
                user_id: users.len() as i64 + 1,
                email: Some(email),
                holdings: vec![holding],
            }),
        }
    }

    tracing::info!(users = users.len(), "Imported portfolios from CSV");
    Ok(users)
}

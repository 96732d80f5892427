use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use portfolio_manager::parse_portfolio_csv;
use sentiment_analysis::RawArticleSentiment;
use sentiment_pipeline::UserRunInput;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Everything one invocation runs over.
#[derive(Debug, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    pub users: Vec<UserRunInput>,
}

pub fn parse_run_file(json: &str) -> Result<RunFile> {
    serde_json::from_str(json).context("run file is not valid JSON")
}

pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read run file {}", path.display()))?;
    parse_run_file(&raw).with_context(|| format!("in {}", path.display()))
}

/// One run input per CSV portfolio, each with the articles about its holdings.
pub fn inputs_from_csv(csv_data: &str, articles_json: &str) -> Result<Vec<UserRunInput>> {
    let portfolios = parse_portfolio_csv(csv_data)?;
    let articles: Vec<RawArticleSentiment> =
        serde_json::from_str(articles_json).context("articles file is not a JSON array")?;
    Ok(portfolios
        .into_iter()
        .map(|p| UserRunInput::from_portfolio(p, &articles))
        .collect())
}

pub fn load_csv_inputs(portfolios: &Path, articles: &Path) -> Result<Vec<UserRunInput>> {
    let csv_data = fs::read_to_string(portfolios)
        .with_context(|| format!("failed to read portfolios {}", portfolios.display()))?;
    let articles_json = fs::read_to_string(articles)
        .with_context(|| format!("failed to read articles {}", articles.display()))?;
    inputs_from_csv(&csv_data, &articles_json)
}

pub fn parse_as_of(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("--as-of '{}' is not an RFC 3339 timestamp", raw))?
        .with_timezone(&Utc))
}

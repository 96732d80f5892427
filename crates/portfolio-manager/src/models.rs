use analysis_core::PortfolioHolding;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's portfolio as loaded from the run file or CSV, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPortfolio {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub holdings: Vec<PortfolioHolding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SentimentHistoryRow {
    pub id: Option<i64>,
    pub user_id: i64,
    pub date: String,
    pub ticker: String,
    pub sentiment_score: f64,
    pub article_count: i64,
    pub avg_confidence: f64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: Option<i64>,
    pub user_id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryLogRow {
    pub id: Option<i64>,
    pub user_id: i64,
    pub sent_at: String,
    pub channel: String,
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

use analysis_core::{PortfolioReport, TickerSentiment};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use std::str::FromStr;

use crate::models::{DeliveryLogRow, DeliveryStatus, PipelineRunRow, RunStatus, SentimentHistoryRow};

const UPSERT_TICKER_SENTIMENT: &str = r#"
    INSERT INTO portfolio_sentiment (user_id, date, ticker, sentiment_score, article_count, avg_confidence)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(user_id, date, ticker) DO UPDATE SET
        sentiment_score = excluded.sentiment_score,
        article_count = excluded.article_count,
        avg_confidence = excluded.avg_confidence,
        created_at = datetime('now')
"#;

/// Write-side history of pipeline runs. Nothing stored here feeds back into
/// a later run.
#[derive(Clone)]
pub struct SentimentStore {
    pool: SqlitePool,
}

impl SentimentStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url {}", database_url))?
            .create_if_missing(true);

        // An in-memory database exists per connection, so keep it to one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("connecting to sentiment history database")?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace one ticker's figures for `(user, date, ticker)`.
    pub async fn upsert_ticker_sentiment(
        &self,
        user_id: i64,
        date: NaiveDate,
        sentiment: &TickerSentiment,
    ) -> Result<()> {
        upsert_ticker_sentiment(&self.pool, user_id, date, sentiment).await
    }

    /// Persist every ticker of a report under the report's as-of date.
    pub async fn save_report(&self, report: &PortfolioReport) -> Result<usize> {
        let date = report.as_of.date_naive();
        let mut tx = self.pool.begin().await?;
        for sentiment in &report.tickers {
            upsert_ticker_sentiment(&mut *tx, report.user_id, date, sentiment).await?;
        }
        tx.commit().await?;

        tracing::debug!(
            user_id = report.user_id,
            tickers = report.tickers.len(),
            "Saved ticker sentiment history"
        );
        Ok(report.tickers.len())
    }

    pub async fn sentiment_history(&self, user_id: i64, date: NaiveDate) -> Result<Vec<SentimentHistoryRow>> {
        let rows = sqlx::query_as::<_, SentimentHistoryRow>(
            "SELECT * FROM portfolio_sentiment WHERE user_id = ? AND date = ? ORDER BY ticker",
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Open a run record in `running` state and return its id.
    pub async fn start_run(&self, user_id: i64, started_at: DateTime<Utc>) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO pipeline_runs (user_id, started_at, status) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(started_at.to_rfc3339())
        .bind(RunStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Close a run as completed, or failed when `error` is set.
    pub async fn finish_run(&self, run_id: i64, error: Option<&str>) -> Result<()> {
        let status = if error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let completed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = ?,
                error_message = ?,
                completed_at = ?,
                execution_time_ms = CAST((julianday(?) - julianday(started_at)) * 86400000 AS INTEGER)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(completed_at.to_rfc3339())
        .bind(completed_at.to_rfc3339())
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<PipelineRunRow>> {
        let row = sqlx::query_as::<_, PipelineRunRow>("SELECT * FROM pipeline_runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    pub async fn record_delivery(
        &self,
        user_id: i64,
        channel: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO email_log (user_id, sent_at, channel, status, error_message) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .bind(channel)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn deliveries(&self, user_id: i64) -> Result<Vec<DeliveryLogRow>> {
        let rows = sqlx::query_as::<_, DeliveryLogRow>(
            "SELECT * FROM email_log WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn upsert_ticker_sentiment<'e, E>(
    executor: E,
    user_id: i64,
    date: NaiveDate,
    sentiment: &TickerSentiment,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(UPSERT_TICKER_SENTIMENT)
        .bind(user_id)
        .bind(date.to_string())
        .bind(&sentiment.ticker)
        .bind(sentiment.sentiment)
        .bind(sentiment.article_count as i64)
        .bind(sentiment.confidence)
        .execute(executor)
        .await?;
    Ok(())
}

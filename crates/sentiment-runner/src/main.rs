use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use notification_service::{NotificationConfig, NotificationService};
use portfolio_manager::SentimentStore;
use sentiment_pipeline::{PipelineConfig, PipelineService, SentimentPipeline};
use std::fs;

mod cli;
mod input;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    tracing::info!("Starting portfolio sentiment run");

    // 2. Configuration
    let config = PipelineConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    config.log_summary();

    // 3. Inputs
    let (file_as_of, users) = match (&cli.input, &cli.portfolios, &cli.articles) {
        (Some(path), _, _) => {
            let run = input::load_run_file(path)?;
            (run.as_of, run.users)
        }
        (None, Some(portfolios), Some(articles)) => {
            (None, input::load_csv_inputs(portfolios, articles)?)
        }
        _ => anyhow::bail!("either --input or --portfolios with --articles is required"),
    };
    let now = match &cli.as_of {
        Some(raw) => input::parse_as_of(raw)?,
        None => file_as_of.unwrap_or_else(Utc::now),
    };
    tracing::info!(users = users.len(), as_of = %now, "Loaded run inputs");

    // 4. Wire the service
    let pipeline = SentimentPipeline::from_config(&config)?;
    let mut service = PipelineService::new(pipeline, config.concurrency);

    if let Some(url) = cli.database_url.as_ref().or(config.database_url.as_ref()) {
        let store = SentimentStore::new(url)
            .await
            .with_context(|| format!("failed to open history database {}", url))?;
        tracing::info!("Sentiment history enabled ({})", url);
        service = service.with_store(store);
    }

    if cli.no_deliver {
        tracing::info!("Report delivery disabled (--no-deliver)");
    } else {
        let notifier = NotificationService::new(&NotificationConfig::from_env());
        tracing::info!("Delivery channels: {}", notifier.channel_names().join(", "));
        service = service.with_notifier(notifier);
    }

    // 5. Run and report
    let summary = service.run_all(users, now).await;
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Run summary written to {}", path.display());
        }
        None => println!("{}", json),
    }

    if summary.reports.is_empty() && !summary.failures.is_empty() {
        anyhow::bail!("all {} user runs failed", summary.failed());
    }
    Ok(())
}

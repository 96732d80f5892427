use analysis_core::{PortfolioHolding, RiskLevel, SentimentLabel};
use approx::assert_abs_diff_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use notification_service::{LogNotifier, NotificationService};
use portfolio_manager::SentimentStore;
use sentiment_analysis::RawArticleSentiment;
use sentiment_pipeline::{PipelineConfig, PipelineService, SentimentPipeline, UserRunInput};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn article(ticker: &str, score: f64, confidence: f64, hours_ago: i64, source: &str) -> RawArticleSentiment {
    RawArticleSentiment {
        ticker: ticker.to_string(),
        label: Some(if score < 0.0 { SentimentLabel::Negative } else { SentimentLabel::Positive }),
        confidence: Some(confidence),
        score: Some(score),
        probabilities: None,
        source: source.to_string(),
        published_at: now() - Duration::hours(hours_ago),
    }
}

fn user(user_id: i64, holdings: &[(&str, f64)], articles: Vec<RawArticleSentiment>) -> UserRunInput {
    UserRunInput {
        user_id,
        email: Some(format!("user{}@example.com", user_id)),
        holdings: holdings.iter().map(|(t, w)| PortfolioHolding::new(t, *w)).collect(),
        articles,
    }
}

fn service() -> PipelineService {
    let pipeline = SentimentPipeline::from_config(&PipelineConfig::default()).unwrap();
    PipelineService::new(pipeline, 2)
}

#[tokio::test]
async fn test_multi_user_run_isolates_failures() {
    let store = SentimentStore::new("sqlite::memory:").await.unwrap();
    let notifier = NotificationService::with_channels(vec![Box::new(LogNotifier)]);
    let service = service().with_store(store.clone()).with_notifier(notifier);

    let inputs = vec![
        user(
            1,
            &[("AAPL", 1.0)],
            vec![
                article("AAPL", 1.0, 0.92, 2, "Reuters"),
                article("AAPL", -1.0, 0.78, 8, "CNBC"),
                article("AAPL", 1.0, 0.85, 14, "Benzinga"),
            ],
        ),
        user(2, &[("AAPL", 0.5), ("MSFT", 0.4)], vec![]),
        user(3, &[("TSLA", 0.5), ("KO", 0.5)], vec![article("TSLA", -0.9, 0.2, 1, "CNBC")]),
    ];

    let summary = service.run_all(inputs, now()).await;

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].user_id, 2);
    assert!(summary.failures[0].error.contains("Configuration error"));

    let first = &summary.reports[0];
    assert_eq!(first.user_id, 1);
    assert_eq!(first.tickers[0].article_count, 3);
    let weights = [0.92, 0.8 * 0.85 * 0.78, 0.6 * 0.6 * 0.85];
    let expected = (weights[0] - weights[1] + weights[2]) / weights.iter().sum::<f64>();
    assert_abs_diff_eq!(first.tickers[0].sentiment, expected, epsilon = 1e-9);
    assert_eq!((first.tickers[0].sentiment * 100.0).round() / 100.0, 0.40);
    assert_abs_diff_eq!(first.portfolio_sentiment, first.tickers[0].sentiment, epsilon = 1e-12);

    let third = &summary.reports[1];
    assert_eq!(third.user_id, 3);
    assert_eq!(third.tickers[1].article_count, 0);
    assert_abs_diff_eq!(third.risk.risk_score, 0.9 * 0.5 * 0.8, epsilon = 1e-12);
    assert_eq!(third.risk.level, RiskLevel::Medium);

    let history = store.sentiment_history(1, now().date_naive()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ticker, "AAPL");
    assert_eq!(history[0].article_count, 3);

    let deliveries = store.deliveries(3).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].channel, "log");
    assert_eq!(deliveries[0].status, "sent");

    let failed_run = run_status(&store, 2).await;
    assert_eq!(failed_run.0, "failed");
    assert!(failed_run.1.is_some());
    assert!(store.deliveries(2).await.unwrap().is_empty());
}

async fn run_status(store: &SentimentStore, user_id: i64) -> (String, Option<String>) {
    // Runs are numbered in start order, which is not fixed under concurrency.
    for run_id in 1..=3 {
        if let Some(run) = store.get_run(run_id).await.unwrap() {
            if run.user_id == user_id {
                return (run.status, run.error_message);
            }
        }
    }
    panic!("no run recorded for user {}", user_id);
}

#[tokio::test]
async fn test_run_without_store_or_notifier() {
    let summary = service()
        .run_all(
            vec![user(7, &[("NVDA", 0.6), ("AMD", 0.4)], vec![article("nvda", 0.6, 0.9, 30, "Reuters")])],
            now(),
        )
        .await;

    assert_eq!(summary.succeeded(), 1);
    let report = &summary.reports[0];
    // The only article is outside the 24h window.
    assert!(report.tickers.iter().all(|t| t.is_neutral_fallback()));
    assert_eq!(report.portfolio_sentiment, 0.0);
    assert_eq!(report.risk.level, RiskLevel::Low);
}

#[tokio::test]
async fn test_reports_keep_input_order() {
    let inputs: Vec<UserRunInput> = (1..=6)
        .map(|id| user(id, &[("AAPL", 1.0)], vec![article("AAPL", 0.1 * id as f64, 0.9, 1, "Reuters")]))
        .collect();

    let summary = service().run_all(inputs, now()).await;
    let ids: Vec<i64> = summary.reports.iter().map(|r| r.user_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
}

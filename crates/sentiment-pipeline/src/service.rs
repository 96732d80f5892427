use analysis_core::{AnalysisError, PortfolioReport};
use chrono::{DateTime, Utc};
use notification_service::NotificationService;
use portfolio_manager::{DeliveryStatus, SentimentStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::pipeline::{SentimentPipeline, UserRunInput};

/// A user whose run produced no report.
#[derive(Debug, Clone, Serialize)]
pub struct UserFailure {
    pub user_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<PortfolioReport>,
    pub failures: Vec<UserFailure>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs many users concurrently. Each user is independent: one failure is
/// recorded and the rest carry on.
///
/// Storage and delivery are optional side effects. Errors from either are
/// logged and never turn a computed report into a failure.
#[derive(Clone)]
pub struct PipelineService {
    pipeline: Arc<SentimentPipeline>,
    store: Option<SentimentStore>,
    notifier: Option<Arc<NotificationService>>,
    concurrency: usize,
}

impl PipelineService {
    pub fn new(pipeline: SentimentPipeline, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store: None,
            notifier: None,
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_store(mut self, store: SentimentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: NotificationService) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn pipeline(&self) -> &SentimentPipeline {
        &self.pipeline
    }

    /// Run every user with at most `concurrency` in flight. Reports and
    /// failures keep the input order.
    pub async fn run_all(&self, inputs: Vec<UserRunInput>, now: DateTime<Utc>) -> RunSummary {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(inputs.len());

        tracing::info!(
            users = inputs.len(),
            concurrency = self.concurrency,
            "Starting portfolio sentiment run"
        );

        for input in inputs {
            let sem = Arc::clone(&semaphore);
            let service = self.clone();
            let user_id = input.user_id;

            handles.push((
                user_id,
                tokio::spawn(async move {
                    let _permit = sem
                        .acquire()
                        .await
                        .map_err(|e| AnalysisError::Execution(e.to_string()))?;
                    service.run_user(input, now).await
                }),
            ));
        }

        let mut summary = RunSummary::default();
        for (user_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AnalysisError::Execution(format!("user task aborted: {}", e))),
            };
            match result {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    tracing::warn!(user_id, "Portfolio run failed: {}", e);
                    summary.failures.push(UserFailure {
                        user_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Portfolio sentiment run finished"
        );
        summary
    }

    /// One user end to end: record the run, compute, store, deliver.
    pub async fn run_user(
        &self,
        input: UserRunInput,
        now: DateTime<Utc>,
    ) -> Result<PortfolioReport, AnalysisError> {
        let user_id = input.user_id;
        let run_id = match &self.store {
            Some(store) => match store.start_run(user_id, Utc::now()).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(user_id, "Failed to record run start: {:#}", e);
                    None
                }
            },
            None => None,
        };

        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::task::spawn_blocking(move || pipeline.run_user(&input, now))
            .await
            .map_err(|e| AnalysisError::Execution(format!("computation panicked: {}", e)))
            .and_then(|r| r);

        if let (Some(store), Some(run_id)) = (&self.store, run_id) {
            let error = result.as_ref().err().map(|e| e.to_string());
            if let Err(e) = store.finish_run(run_id, error.as_deref()).await {
                tracing::warn!(user_id, run_id, "Failed to record run completion: {:#}", e);
            }
        }

        let report = result?;

        if let Some(store) = &self.store {
            match store.save_report(&report).await {
                Ok(rows) => tracing::debug!(user_id, rows, "Stored ticker sentiment"),
                Err(e) => tracing::warn!(user_id, "Failed to store sentiment history: {:#}", e),
            }
        }

        if let Some(notifier) = &self.notifier {
            for outcome in notifier.deliver(&report).await {
                let Some(store) = &self.store else { continue };
                let status = if outcome.is_sent() {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                };
                if let Err(e) = store
                    .record_delivery(user_id, &outcome.channel, status, outcome.error.as_deref())
                    .await
                {
                    tracing::warn!(user_id, "Failed to record delivery: {:#}", e);
                }
            }
        }

        Ok(report)
    }
}

mod digest;
mod log_channel;
mod smtp;

pub use digest::{sentiment_label, ReportDigest};
pub use log_channel::LogNotifier;
pub use smtp::SmtpNotifier;

use analysis_core::PortfolioReport;
use async_trait::async_trait;

/// A destination for finished portfolio reports.
#[async_trait]
pub trait ReportChannel: Send + Sync {
    async fn deliver(&self, report: &PortfolioReport) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No recipient for user {0}")]
    NoRecipient(i64),
}

/// Configuration for report delivery.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    /// Fallback recipients for reports whose user has no e-mail address
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset and blank keys count as missing. An unparseable port falls back
    /// to 587 rather than disabling delivery.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let smtp_tls = match get("SMTP_TLS").map(|v| v.to_lowercase()).as_deref() {
            Some("tls") => SmtpTls::Tls,
            Some("none") => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: get("SMTP_HOST"),
            smtp_port: get("SMTP_PORT").and_then(|p| p.parse().ok()).unwrap_or(587),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_from: get("SMTP_FROM_ADDRESS"),
            smtp_to: get("NOTIFICATION_EMAIL_TO")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|addr| !addr.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            smtp_tls,
        }
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some()
    }
}

/// Result of handing one report to one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        self.error.is_none()
    }
}

/// Dispatches reports to every configured channel. Failures are logged and
/// returned, never raised: a computed report stands whether or not it was sent.
pub struct NotificationService {
    channels: Vec<Box<dyn ReportChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn ReportChannel>> = Vec::new();

        if config.smtp_configured() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!("Email delivery enabled (SMTP via {:?})", config.smtp_host);
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        if channels.is_empty() {
            tracing::info!("No email channel configured (set SMTP_HOST), reports go to the log");
            channels.push(Box::new(LogNotifier));
        }

        Self { channels }
    }

    pub fn with_channels(channels: Vec<Box<dyn ReportChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn deliver(&self, report: &PortfolioReport) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let error = match channel.deliver(report).await {
                Ok(()) => {
                    tracing::debug!(user_id = report.user_id, "Delivered report via {}", channel.name());
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = report.user_id,
                        "Failed to deliver report via {}: {}",
                        channel.name(),
                        e
                    );
                    Some(e.to_string())
                }
            };
            outcomes.push(DeliveryOutcome {
                channel: channel.name().to_string(),
                error,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{ActionSignal, RiskAssessment, RiskLevel};
    use chrono::Utc;
    use std::collections::BTreeMap;

    struct FailingChannel;

    #[async_trait]
    impl ReportChannel for FailingChannel {
        async fn deliver(&self, report: &PortfolioReport) -> Result<(), NotificationError> {
            Err(NotificationError::NoRecipient(report.user_id))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn report() -> PortfolioReport {
        PortfolioReport {
            user_id: 9,
            email: None,
            as_of: Utc::now(),
            portfolio: vec![],
            tickers: vec![],
            portfolio_sentiment: 0.0,
            risk: RiskAssessment {
                level: RiskLevel::Low,
                signal: ActionSignal::Hold,
                reason: RiskLevel::Low.reason().to_string(),
                risk_score: 0.0,
                per_ticker_risk: BTreeMap::new(),
            },
            rejected_articles: 0,
            weights_normalized: false,
        }
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_TLS", "TLS"),
            ("SMTP_FROM_ADDRESS", "reports@example.com"),
            ("SMTP_PASSWORD", "  "),
            ("NOTIFICATION_EMAIL_TO", "ops@example.com, ,risk@example.com"),
        ]
        .into_iter()
        .collect();
        let config = NotificationConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.smtp_configured());
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.smtp_tls, SmtpTls::Tls);
        assert!(config.smtp_password.is_none());
        assert_eq!(config.smtp_to, vec!["ops@example.com", "risk@example.com"]);

        let empty = NotificationConfig::from_lookup(|_| None);
        assert!(!empty.smtp_configured());
        assert_eq!(empty.smtp_port, 587);
        assert_eq!(empty.smtp_tls, SmtpTls::StartTls);
    }

    #[test]
    fn test_unconfigured_service_falls_back_to_log() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert_eq!(service.channel_names(), vec!["log"]);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let service = NotificationService::with_channels(vec![
            Box::new(FailingChannel),
            Box::new(LogNotifier),
        ]);
        let outcomes = service.deliver(&report()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_sent());
        assert_eq!(outcomes[0].error.as_deref(), Some("No recipient for user 9"));
        assert!(outcomes[1].is_sent());
    }
}

use analysis_core::PortfolioReport;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::digest::ReportDigest;
use crate::{NotificationConfig, NotificationError, ReportChannel, SmtpTls};

/// Sends the plain-text digest to the report's user, or to the configured
/// fallback recipients when the user has no address.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    fallback_to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?;

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {}", e)))?;

        let fallback_to: Vec<Mailbox> = config
            .smtp_to
            .iter()
            .filter_map(|addr| addr.parse().ok())
            .collect();

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            fallback_to,
        })
    }

    fn recipients(&self, report: &PortfolioReport) -> Result<Vec<Mailbox>, NotificationError> {
        match report.email.as_deref() {
            Some(addr) => {
                let mailbox = addr.parse().map_err(|e| {
                    NotificationError::Config(format!("Invalid address for user {}: {}", report.user_id, e))
                })?;
                Ok(vec![mailbox])
            }
            None if !self.fallback_to.is_empty() => Ok(self.fallback_to.clone()),
            None => Err(NotificationError::NoRecipient(report.user_id)),
        }
    }
}

#[async_trait]
impl ReportChannel for SmtpNotifier {
    async fn deliver(&self, report: &PortfolioReport) -> Result<(), NotificationError> {
        let subject = ReportDigest::subject(report);
        let body = ReportDigest::render(report);

        for recipient in self.recipients(report)? {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

use std::sync::Arc;

use futures_util::future::BoxFuture;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::model::ContactSubmission;
use crate::config::{Config, SmtpConfig};
use crate::error::{ConfigError, NotifyError};

/// Delivers contact submissions to whoever answers them.
pub trait ContactNotifier: Send + Sync {
    fn notify<'a>(&'a self, submission: &'a ContactSubmission)
    -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// SMTP delivery when `SMTP_HOST` is configured, log-only otherwise.
pub fn notifier_from_config(config: &Config) -> Result<Arc<dyn ContactNotifier>, ConfigError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Contact notifications via SMTP");
            Ok(Arc::new(SmtpNotifier::new(smtp)?))
        }
        None => {
            tracing::info!("SMTP_HOST not set, contact submissions are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Writes submissions to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ContactNotifier for LogNotifier {
    fn notify<'a>(
        &'a self,
        submission: &'a ContactSubmission,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            tracing::info!(
                id = %submission.id,
                name = %submission.name,
                email = %submission.email,
                subject = submission.subject.as_deref().unwrap_or(""),
                "New contact form submission"
            );
            Ok(())
        })
    }
}

/// Mails each submission to the shop inbox, with `Reply-To` set to the
/// customer.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, ConfigError> {
        let mailbox = |name: &'static str, value: &str| {
            value.parse::<Mailbox>().map_err(|_| ConfigError::Invalid {
                name,
                value: value.to_string(),
            })
        };
        let from = mailbox("CONTACT_EMAIL_FROM", &config.from)?;
        let to = mailbox("CONTACT_EMAIL_TO", &config.to)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|_| ConfigError::Invalid {
                name: "SMTP_HOST",
                value: config.host.clone(),
            })?
            .port(config.port);
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn compose(&self, submission: &ContactSubmission) -> Result<Message, NotifyError> {
        let subject = match &submission.subject {
            Some(subject) => format!("New contact request: {}", subject),
            None => format!("New contact request from {}", submission.name),
        };

        let mut body = format!(
            "Name: {}\nEmail: {}\n",
            submission.name, submission.email
        );
        if let Some(phone) = &submission.phone {
            body.push_str(&format!("Phone: {}\n", phone));
        }
        body.push_str(&format!(
            "Received: {}\nReference: {}\n\n{}\n",
            submission.received_at.to_rfc3339(),
            submission.id,
            submission.message
        ));

        let mut message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        match submission.email.parse() {
            Ok(address) => {
                message = message.reply_to(Mailbox::new(Some(submission.name.clone()), address));
            }
            Err(e) => {
                tracing::debug!(id = %submission.id, "No Reply-To, address rejected: {}", e);
            }
        }

        message
            .body(body)
            .map_err(|e| NotifyError::Delivery(format!("failed to build email: {}", e)))
    }
}

impl ContactNotifier for SmtpNotifier {
    fn notify<'a>(
        &'a self,
        submission: &'a ContactSubmission,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let message = self.compose(submission)?;
            self.transport
                .send(message)
                .await
                .map_err(|e| NotifyError::Delivery(format!("SMTP send failed: {}", e)))?;
            tracing::info!(id = %submission.id, "Contact submission mailed");
            Ok(())
        })
    }
}

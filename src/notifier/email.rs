//! Email alert delivery through the Resend API.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use super::{error::NotifyError, template, template::EmailTemplates, Channel, Notifier};
use crate::{
    config::{EmailConfig, RetryConfig},
    models::{Alert, Subscriber},
};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Transport seam for sending a rendered email.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MailSender: Send + Sync {
    /// Delivers one email. Returns an error for transport failures and
    /// provider rejections alike.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError>;
}

/// [`MailSender`] backed by the Resend HTTP API.
pub struct ResendMailer {
    endpoint: Url,
    api_key: String,
    from_address: String,
    client: reqwest::Client,
}

impl ResendMailer {
    /// Creates a mailer from the email channel configuration.
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        Self::with_endpoint(config, Url::parse(RESEND_ENDPOINT)?)
    }

    /// Creates a mailer against a custom API endpoint.
    pub fn with_endpoint(config: &EmailConfig, endpoint: Url) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().build().map_err(NotifyError::ClientBuild)?;
        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl MailSender for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let body = json!({
            "from": &self.from_address,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected { status: status.as_u16() })
        }
    }
}

/// Mail channel notifier. Always attempted for every subscriber.
pub struct EmailNotifier {
    sender: Arc<dyn MailSender>,
    templates: EmailTemplates,
    frontend_url: Url,
    retry: RetryConfig,
}

impl EmailNotifier {
    /// Creates the mail channel over the given transport.
    pub fn new(
        sender: Arc<dyn MailSender>,
        frontend_url: Url,
        retry: RetryConfig,
    ) -> Result<Self, NotifyError> {
        Ok(Self { sender, templates: EmailTemplates::new()?, frontend_url, retry })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, alert: &Alert, subscriber: &Subscriber) -> bool {
        let product = &alert.change.new_state;
        let locale = subscriber.preferences.region;

        let html = match self.templates.render(alert, &subscriber.email, locale, &self.frontend_url)
        {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(
                    subscriber_id = %subscriber.id,
                    error = %e,
                    "Failed to render alert email."
                );
                return false;
            }
        };
        let subject = template::subject(&product.name, locale);

        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.sender.send(&subscriber.email, &subject, &html).await {
                Ok(()) => {
                    tracing::info!(
                        subscriber_id = %subscriber.id,
                        email = %subscriber.email,
                        product = %product.name,
                        attempt,
                        "Alert email sent."
                    );
                    return true;
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                let backoff = self.retry.backoff_delay(attempt - 1);
                tracing::warn!(
                    subscriber_id = %subscriber.id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_error,
                    "Email send failed; retrying."
                );
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::error!(subscriber_id = %subscriber.id, error = %last_error, "Email retries exhausted.");
        false
    }
}

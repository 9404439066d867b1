//! iOS push delivery through APNs.

use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use super::{error::NotifyError, Channel, Notifier};
use crate::{
    config::{ApnsConfig, RetryConfig},
    models::{Alert, Platform, Subscriber},
};

const APNS_PRODUCTION: &str = "https://api.push.apple.com";
const APNS_SANDBOX: &str = "https://api.sandbox.push.apple.com";

/// Transport seam for delivering one APNs notification.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ApnsSender: Send + Sync {
    /// Delivers `message` to the device identified by `device_token`.
    async fn deliver(&self, device_token: &str, message: &Value) -> Result<(), NotifyError>;
}

/// [`ApnsSender`] backed by the APNs HTTP API.
pub struct ApnsHttpSender {
    host: Url,
    topic: String,
    auth_token: String,
    client: reqwest::Client,
}

impl ApnsHttpSender {
    /// Creates a sender against the production or sandbox environment,
    /// depending on configuration.
    pub fn new(config: &ApnsConfig) -> Result<Self, NotifyError> {
        let host = if config.use_sandbox { APNS_SANDBOX } else { APNS_PRODUCTION };
        Self::with_endpoint(config, Url::parse(host)?)
    }

    /// Creates a sender against a custom host.
    pub fn with_endpoint(config: &ApnsConfig, host: Url) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().build().map_err(NotifyError::ClientBuild)?;
        Ok(Self {
            host,
            topic: config.topic.clone(),
            auth_token: config.auth_token.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ApnsSender for ApnsHttpSender {
    async fn deliver(&self, device_token: &str, message: &Value) -> Result<(), NotifyError> {
        let url = self.host.join(&format!("3/device/{device_token}"))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .json(message)
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

/// Structured APNs message: the standard alert envelope plus custom product
/// fields the app uses to render a rich notification.
fn build_message(alert: &Alert) -> Value {
    let product = &alert.change.new_state;
    json!({
        "aps": {
            "alert": {
                "title": "Norrøna Alert",
                "body": format!("{} – {:.2} NOK", product.name, product.price),
            },
            "sound": "default",
            "mutable-content": 1,
        },
        "product_url": &product.url,
        "image_url": &product.image_url,
        "product_name": &product.name,
        "price": product.price,
    })
}

/// iOS push channel notifier. A subscriber without iOS devices is a no-op
/// success.
pub struct ApnsPushNotifier {
    sender: Arc<dyn ApnsSender>,
    retry: RetryConfig,
}

impl ApnsPushNotifier {
    /// Creates the iOS push channel over the given transport.
    pub fn new(sender: Arc<dyn ApnsSender>, retry: RetryConfig) -> Self {
        Self { sender, retry }
    }

    async fn send_to_device(&self, subscriber: &Subscriber, token: &str, message: &Value) -> bool {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.sender.deliver(token, message).await {
                Ok(()) => {
                    tracing::info!(subscriber_id = %subscriber.id, attempt, "APNs notification sent.");
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
                    "APNs delivery failed; retrying."
                );
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::error!(subscriber_id = %subscriber.id, error = %last_error, "APNs retries exhausted.");
        false
    }
}

#[async_trait::async_trait]
impl Notifier for ApnsPushNotifier {
    fn channel(&self) -> Channel {
        Channel::Apns
    }

    async fn send(&self, alert: &Alert, subscriber: &Subscriber) -> bool {
        let ios_devices: Vec<&str> = subscriber
            .devices
            .iter()
            .filter(|d| d.platform == Platform::Ios)
            .map(|d| d.token.as_str())
            .collect();

        if ios_devices.is_empty() {
            return true;
        }

        let message = build_message(alert);
        let mut all_succeeded = true;
        for token in ios_devices {
            if !self.send_to_device(subscriber, token, &message).await {
                all_succeeded = false;
            }
        }
        all_succeeded
    }
}

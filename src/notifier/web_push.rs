//! Browser push delivery.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{error::NotifyError, Channel, Notifier};
use crate::{
    config::{RetryConfig, WebPushConfig},
    models::{Alert, Platform, Subscriber},
};

/// Transport seam for delivering one browser push message.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WebPushSender: Send + Sync {
    /// Pushes `payload` to the subscription described by `device_token`.
    async fn push(&self, device_token: &str, payload: &Value) -> Result<(), NotifyError>;
}

/// The browser push subscription document stored as the device token.
#[derive(Debug, Deserialize)]
struct PushSubscription {
    endpoint: String,
}

/// [`WebPushSender`] that posts payloads to the subscription endpoint.
pub struct HttpWebPushSender {
    signing_key: String,
    contact_email: String,
    client: reqwest::Client,
}

impl HttpWebPushSender {
    /// Creates a sender from the web push channel configuration.
    pub fn new(config: &WebPushConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().build().map_err(NotifyError::ClientBuild)?;
        Ok(Self {
            signing_key: config.signing_key.clone(),
            contact_email: config.contact_email.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl WebPushSender for HttpWebPushSender {
    async fn push(&self, device_token: &str, payload: &Value) -> Result<(), NotifyError> {
        let subscription: PushSubscription = serde_json::from_str(device_token)
            .map_err(|e| NotifyError::InvalidDeviceToken(e.to_string()))?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("vapid k={}, sub=mailto:{}", self.signing_key, self.contact_email),
            )
            .json(payload)
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

/// Compact payload shown by the browser notification.
fn build_payload(alert: &Alert) -> Value {
    let product = &alert.change.new_state;
    json!({
        "title": "Norrøna Alert",
        "body": format!("{} – {:.2} NOK", product.name, product.price),
        "url": &product.url,
        "icon": &product.image_url,
    })
}

/// Browser push channel notifier. A subscriber without web devices is a
/// no-op success.
pub struct WebPushNotifier {
    sender: Arc<dyn WebPushSender>,
    retry: RetryConfig,
}

impl WebPushNotifier {
    /// Creates the browser push channel over the given transport.
    pub fn new(sender: Arc<dyn WebPushSender>, retry: RetryConfig) -> Self {
        Self { sender, retry }
    }

    async fn send_to_device(&self, subscriber: &Subscriber, token: &str, payload: &Value) -> bool {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.sender.push(token, payload).await {
                Ok(()) => {
                    tracing::info!(subscriber_id = %subscriber.id, attempt, "Web push sent.");
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
                    "Web push failed; retrying."
                );
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::error!(subscriber_id = %subscriber.id, error = %last_error, "Web push retries exhausted.");
        false
    }
}

#[async_trait::async_trait]
impl Notifier for WebPushNotifier {
    fn channel(&self) -> Channel {
        Channel::WebPush
    }

    async fn send(&self, alert: &Alert, subscriber: &Subscriber) -> bool {
        let web_devices: Vec<&str> = subscriber
            .devices
            .iter()
            .filter(|d| d.platform == Platform::Web)
            .map(|d| d.token.as_str())
            .collect();

        if web_devices.is_empty() {
            return true;
        }

        let payload = build_payload(alert);
        let mut all_succeeded = true;
        for token in web_devices {
            if !self.send_to_device(subscriber, token, &payload).await {
                all_succeeded = false;
            }
        }
        all_succeeded
    }
}

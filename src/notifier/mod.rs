//! Alert delivery channels and the dispatch registry.
//!
//! Each channel implements [`Notifier`] over a narrow transport seam so the
//! provider protocol can be faked in tests. Channels never raise: internal
//! failures are absorbed after retry exhaustion and reported as `false`.

pub mod apns;
pub mod email;
pub mod error;
pub mod template;
pub mod web_push;

use std::{collections::HashMap, fmt, sync::Arc};

use tokio::task::JoinHandle;

pub use apns::{ApnsHttpSender, ApnsPushNotifier, ApnsSender};
pub use email::{EmailNotifier, MailSender, ResendMailer};
pub use error::NotifyError;
pub use web_push::{HttpWebPushSender, WebPushNotifier, WebPushSender};

use crate::models::{Alert, Platform, Subscriber};

/// Delivery channel identifiers, used as keys in dispatch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Email delivery.
    Email,
    /// Browser push delivery.
    WebPush,
    /// iOS push delivery.
    Apns,
}

impl Channel {
    /// Stable channel name for logs and dispatch results.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::WebPush => "web_push",
            Channel::Apns => "apns",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert delivery channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Which channel this notifier serves.
    fn channel(&self) -> Channel;

    /// Delivers the alert to the subscriber. Never raises; returns whether
    /// delivery ultimately succeeded.
    async fn send(&self, alert: &Alert, subscriber: &Subscriber) -> bool;
}

/// Routes one alert to every channel relevant for a subscriber.
pub struct DispatchRegistry {
    email: Arc<dyn Notifier>,
    web_push: Arc<dyn Notifier>,
    apns: Arc<dyn Notifier>,
}

impl DispatchRegistry {
    /// Creates a registry over the three channel notifiers.
    pub fn new(
        email: Arc<dyn Notifier>,
        web_push: Arc<dyn Notifier>,
        apns: Arc<dyn Notifier>,
    ) -> Self {
        Self { email, web_push, apns }
    }

    /// Dispatches the alert to all relevant channels concurrently and
    /// returns the per-channel outcomes.
    ///
    /// Email is always attempted; browser push only when the subscriber has
    /// a web device; iOS push only when they have an iOS device. A panic in
    /// one channel is recorded as `false` without affecting the others, and
    /// this call itself never fails.
    pub async fn notify(&self, alert: &Alert, subscriber: &Subscriber) -> HashMap<Channel, bool> {
        let mut tasks: Vec<(Channel, JoinHandle<bool>)> =
            vec![spawn_channel(Arc::clone(&self.email), alert, subscriber)];

        if subscriber.devices.iter().any(|d| d.platform == Platform::Web) {
            tasks.push(spawn_channel(Arc::clone(&self.web_push), alert, subscriber));
        }
        if subscriber.devices.iter().any(|d| d.platform == Platform::Ios) {
            tasks.push(spawn_channel(Arc::clone(&self.apns), alert, subscriber));
        }

        let mut results = HashMap::new();
        for (channel, handle) in tasks {
            let outcome = match handle.await {
                Ok(ok) => ok,
                Err(e) => {
                    tracing::error!(
                        subscriber_id = %subscriber.id,
                        %channel,
                        error = %e,
                        "Notification channel failed unexpectedly."
                    );
                    false
                }
            };
            results.insert(channel, outcome);
        }

        tracing::info!(
            subscriber_id = %subscriber.id,
            rule = alert.matched_rule.as_str(),
            ?results,
            "Dispatch complete."
        );
        results
    }
}

fn spawn_channel(
    notifier: Arc<dyn Notifier>,
    alert: &Alert,
    subscriber: &Subscriber,
) -> (Channel, JoinHandle<bool>) {
    let channel = notifier.channel();
    let alert = alert.clone();
    let subscriber = subscriber.clone();
    let handle = tokio::spawn(async move { notifier.send(&alert, &subscriber).await });
    (channel, handle)
}

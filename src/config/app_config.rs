use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    helpers::{deserialize_duration_from_minutes, deserialize_duration_from_seconds},
    retry::RetryConfig,
};
use crate::models::Locale;

/// Floor for the cycle interval; scraping an outlet more often than hourly
/// is not polite.
const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Floor for the delay between any two outbound requests of one scraper.
const MIN_REQUEST_DELAY: Duration = Duration::from_secs(10);

fn default_cycle_interval() -> Duration {
    MIN_CYCLE_INTERVAL
}

fn default_min_request_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_retry() -> RetryConfig {
    RetryConfig {
        initial_backoff: Duration::from_secs(2),
        ..RetryConfig::default()
    }
}

fn static_url(s: &str) -> Url {
    Url::parse(s).expect("static URL is valid")
}

fn default_uk_outlet() -> Url {
    static_url("https://www.norrona.com/en-GB/outlet/")
}

fn default_no_outlet() -> Url {
    static_url("https://www.norrona.com/nb-NO/outlet/")
}

fn default_frontend_url() -> Url {
    static_url("http://localhost:3000")
}

/// The outlet page URL for each supported locale.
#[derive(Debug, Clone, Deserialize)]
pub struct OutletUrls {
    /// UK outlet page.
    #[serde(rename = "en-GB", default = "default_uk_outlet")]
    pub en_gb: Url,
    /// Norway outlet page.
    #[serde(rename = "nb-NO", default = "default_no_outlet")]
    pub nb_no: Url,
}

impl OutletUrls {
    /// The outlet URL for the given locale.
    pub fn for_locale(&self, locale: Locale) -> &Url {
        match locale {
            Locale::EnGb => &self.en_gb,
            Locale::NbNo => &self.nb_no,
        }
    }
}

impl Default for OutletUrls {
    fn default() -> Self {
        Self { en_gb: default_uk_outlet(), nb_no: default_no_outlet() }
    }
}

/// Credentials for the external mail provider. Opaque to the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    /// API key for the mail provider.
    #[serde(default)]
    pub api_key: String,
    /// Sender address alerts are delivered from.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

fn default_from_address() -> String {
    "alerts@varsel.local".to_string()
}

/// Credentials for the external browser push provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebPushConfig {
    /// Signing credential presented to push endpoints.
    #[serde(default)]
    pub signing_key: String,
    /// Contact address included with the signing credential.
    #[serde(default)]
    pub contact_email: String,
}

/// Credentials for the external mobile push provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApnsConfig {
    /// The topic (application bundle identifier) pushes are addressed to.
    #[serde(default)]
    pub topic: String,
    /// Provider authentication token.
    #[serde(default)]
    pub auth_token: String,
    /// Whether to target the sandbox environment.
    #[serde(default)]
    pub use_sandbox: bool,
}

/// Application configuration, constructed once at process start and passed
/// by reference into each component. No component reads ambient state.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Interval between full alert cycles. Clamped to at least one hour.
    #[serde(
        default = "default_cycle_interval",
        deserialize_with = "deserialize_duration_from_minutes",
        rename = "cycle_interval_minutes"
    )]
    pub cycle_interval: Duration,

    /// Minimum wall-clock delay between two outbound requests issued by the
    /// same scraper instance. Clamped to at least ten seconds.
    #[serde(
        default = "default_min_request_delay",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "min_request_delay_secs"
    )]
    pub min_request_delay: Duration,

    /// Per-attempt timeout for outbound HTTP requests.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "request_timeout_secs"
    )]
    pub request_timeout: Duration,

    /// Outlet page URLs per locale.
    #[serde(default)]
    pub outlets: OutletUrls,

    /// Endpoint of the JavaScript-capable rendering service used as a
    /// fallback when the lightweight fetch yields no parseable products.
    /// `None` disables the fallback.
    #[serde(default)]
    pub render_service: Option<Url>,

    /// Base URL of the subscriber-facing frontend, used for unsubscribe
    /// links in alert e-mails.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: Url,

    /// Retry policy for page fetches.
    #[serde(default = "default_fetch_retry")]
    pub fetch_retry: RetryConfig,

    /// Retry policy for delivery channels.
    #[serde(default)]
    pub delivery_retry: RetryConfig,

    /// Mail provider credentials.
    #[serde(default)]
    pub email: EmailConfig,

    /// Browser push provider credentials.
    #[serde(default)]
    pub web_push: WebPushConfig,

    /// Mobile push provider credentials.
    #[serde(default)]
    pub apns: ApnsConfig,

    /// Path to the subscriber list file, resolved from the config directory.
    #[serde(skip_deserializing)]
    pub subscriber_config_path: PathBuf,
}

impl AppConfig {
    /// Reads the configuration from `<dir>/varsel.yaml` (optional) layered
    /// with `VARSEL__`-prefixed environment variables, then enforces the
    /// politeness floors.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{config_dir_str}/varsel.yaml")).required(false))
            .add_source(Environment::with_prefix("VARSEL").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        config.subscriber_config_path = Path::new(config_dir_str).join("subscribers.yaml");
        config.clamp_politeness_floors();

        Ok(config)
    }

    fn clamp_politeness_floors(&mut self) {
        if self.cycle_interval < MIN_CYCLE_INTERVAL {
            tracing::warn!(
                configured_secs = self.cycle_interval.as_secs(),
                floor_secs = MIN_CYCLE_INTERVAL.as_secs(),
                "Configured cycle interval is below the floor; clamping."
            );
            self.cycle_interval = MIN_CYCLE_INTERVAL;
        }
        if self.min_request_delay < MIN_REQUEST_DELAY {
            tracing::warn!(
                configured_secs = self.min_request_delay.as_secs(),
                floor_secs = MIN_REQUEST_DELAY.as_secs(),
                "Configured request delay is below the floor; clamping."
            );
            self.min_request_delay = MIN_REQUEST_DELAY;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cycle_interval: default_cycle_interval(),
            min_request_delay: default_min_request_delay(),
            request_timeout: default_request_timeout(),
            outlets: OutletUrls::default(),
            render_service: None,
            frontend_url: default_frontend_url(),
            fetch_retry: default_fetch_retry(),
            delivery_retry: RetryConfig::default(),
            email: EmailConfig::default(),
            web_push: WebPushConfig::default(),
            apns: ApnsConfig::default(),
            subscriber_config_path: PathBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_the_politeness_floors() {
        let mut config = AppConfig::default();
        config.clamp_politeness_floors();
        assert_eq!(config.cycle_interval, Duration::from_secs(3600));
        assert_eq!(config.min_request_delay, Duration::from_secs(30));
    }

    #[test]
    fn floors_are_enforced() {
        let mut config = AppConfig {
            cycle_interval: Duration::from_secs(60),
            min_request_delay: Duration::from_secs(1),
            ..AppConfig::default()
        };
        config.clamp_politeness_floors();
        assert_eq!(config.cycle_interval, Duration::from_secs(3600));
        assert_eq!(config.min_request_delay, Duration::from_secs(10));
    }

    #[test]
    fn outlet_urls_cover_every_locale() {
        let outlets = OutletUrls::default();
        for locale in Locale::ALL {
            let url = outlets.for_locale(locale);
            assert!(url.path().contains("outlet"));
        }
    }
}

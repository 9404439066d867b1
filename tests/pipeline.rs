//! End-to-end pipeline tests: a stubbed outlet page flows through scrape,
//! diff, persistence and matching into recorded channel deliveries.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use serde_json::Value;
use url::Url;
use uuid::Uuid;
use varsel::{
    config::{AppConfig, RetryConfig},
    models::{
        DeviceRegistration, Locale, Platform, ProductSnapshot, Subscriber, UserPreferences,
    },
    notifier::{
        ApnsPushNotifier, ApnsSender, DispatchRegistry, EmailNotifier, MailSender, NotifyError,
        WebPushNotifier, WebPushSender,
    },
    persistence::{MemorySnapshotStore, SnapshotStore, StaticSubscriberDirectory},
    scheduler::AlertScheduler,
    scraper::{CatalogSource, OutletScraper},
};

const OUTLET_PAGE: &str = r#"
    <html><body><ul>
      <li class="product-card">
        <a class="product-card__link" href="/en-GB/products/falketind-jacket">
          <h3 class="product-card__title">Falketind Gore-Tex Jacket</h3>
        </a>
        <span class="product-card__price--sale">£199.00</span>
        <span class="product-card__price--original">£400.00</span>
        <ul class="product-card__sizes"><li>S</li><li>M</li></ul>
        <img class="product-card__image" src="/images/falketind.jpg">
      </li>
    </ul></body></html>"#;

#[derive(Default)]
struct RecordingMailSender {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait::async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((to.to_string(), subject.to_string(), html.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingWebPushSender {
    sent: Mutex<Vec<(String, Value)>>,
}

#[async_trait::async_trait]
impl WebPushSender for RecordingWebPushSender {
    async fn push(&self, device_token: &str, payload: &Value) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((device_token.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingApnsSender {
    sent: Mutex<Vec<(String, Value)>>,
}

#[async_trait::async_trait]
impl ApnsSender for RecordingApnsSender {
    async fn deliver(&self, device_token: &str, message: &Value) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((device_token.to_string(), message.clone()));
        Ok(())
    }
}

struct Pipeline {
    scheduler: AlertScheduler,
    mail: Arc<RecordingMailSender>,
    web_push: Arc<RecordingWebPushSender>,
    apns: Arc<RecordingApnsSender>,
}

fn test_config() -> AppConfig {
    AppConfig {
        min_request_delay: Duration::ZERO,
        fetch_retry: RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            backoff_base: 2,
        },
        delivery_retry: RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            backoff_base: 2,
        },
        ..AppConfig::default()
    }
}

fn build_pipeline(
    server: &mockito::Server,
    subscribers: Vec<Subscriber>,
    snapshots: Arc<MemorySnapshotStore>,
) -> Pipeline {
    let config = test_config();
    let outlet_url = Url::parse(&format!("{}/en-GB/outlet/", server.url())).unwrap();
    let scraper = OutletScraper::new(Locale::EnGb, outlet_url, &config, None).unwrap();
    let sources: Vec<Arc<dyn CatalogSource>> = vec![Arc::new(scraper)];

    let mail = Arc::new(RecordingMailSender::default());
    let web_push = Arc::new(RecordingWebPushSender::default());
    let apns = Arc::new(RecordingApnsSender::default());

    let frontend_url = Url::parse("https://varsel.example/").unwrap();
    let registry = Arc::new(DispatchRegistry::new(
        Arc::new(
            EmailNotifier::new(mail.clone(), frontend_url, config.delivery_retry.clone()).unwrap(),
        ),
        Arc::new(WebPushNotifier::new(web_push.clone(), config.delivery_retry.clone())),
        Arc::new(ApnsPushNotifier::new(apns.clone(), config.delivery_retry.clone())),
    ));

    let scheduler = AlertScheduler::new(
        sources,
        snapshots,
        Arc::new(StaticSubscriberDirectory::new(subscribers)),
        registry,
        config.cycle_interval,
    );
    Pipeline { scheduler, mail, web_push, apns }
}

fn subscriber(region: Locale, devices: Vec<DeviceRegistration>) -> Subscriber {
    Subscriber {
        id: Uuid::new_v4(),
        email: "kari@example.com".to_string(),
        preferences: UserPreferences { region, ..UserPreferences::default() },
        devices,
    }
}

async fn stub_outlet(server: &mut mockito::Server) {
    server.mock("GET", "/robots.txt").with_status(404).create_async().await;
    server
        .mock("GET", "/en-GB/outlet/")
        .with_status(200)
        .with_body(OUTLET_PAGE)
        .create_async()
        .await;
}

#[tokio::test]
async fn first_cycle_alerts_a_matching_subscriber_on_every_channel() {
    let mut server = mockito::Server::new_async().await;
    stub_outlet(&mut server).await;

    let devices = vec![
        DeviceRegistration {
            token: r#"{"endpoint":"https://push.example/sub-1"}"#.to_string(),
            platform: Platform::Web,
        },
        DeviceRegistration { token: "apns-tok-1".to_string(), platform: Platform::Ios },
    ];
    let pipeline = build_pipeline(
        &server,
        vec![subscriber(Locale::EnGb, devices)],
        Arc::new(MemorySnapshotStore::new()),
    );

    pipeline.scheduler.run_cycle().await;

    let mails = pipeline.mail.sent.lock().unwrap();
    assert_eq!(mails.len(), 1);
    let (to, subject, html) = &mails[0];
    assert_eq!(to, "kari@example.com");
    assert_eq!(subject, "Price Alert: Falketind Gore-Tex Jacket");
    assert!(html.contains("199.00 NOK"));
    assert!(html.contains("400.00 NOK"));
    assert!(html.contains("New Product"));

    let pushes = pipeline.web_push.sent.lock().unwrap();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].1["body"], "Falketind Gore-Tex Jacket – 199.00 NOK");

    let apns = pipeline.apns.sent.lock().unwrap();
    assert_eq!(apns.len(), 1);
    assert_eq!(apns[0].0, "apns-tok-1");
    assert_eq!(apns[0].1["aps"]["alert"]["title"], "Norrøna Alert");
}

#[tokio::test]
async fn region_mismatch_delivers_nothing() {
    let mut server = mockito::Server::new_async().await;
    stub_outlet(&mut server).await;

    let pipeline = build_pipeline(
        &server,
        vec![subscriber(Locale::NbNo, Vec::new())],
        Arc::new(MemorySnapshotStore::new()),
    );

    pipeline.scheduler.run_cycle().await;

    assert!(pipeline.mail.sent.lock().unwrap().is_empty());
    assert!(pipeline.web_push.sent.lock().unwrap().is_empty());
    assert!(pipeline.apns.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn an_unchanged_catalog_delivers_nothing() {
    let mut server = mockito::Server::new_async().await;
    stub_outlet(&mut server).await;

    // Preload the reference state with exactly what the page serves.
    let existing = ProductSnapshot {
        name: "Falketind Gore-Tex Jacket".to_string(),
        url: format!("{}/en-GB/products/falketind-jacket", server.url()),
        price: 199.0,
        original_price: 400.0,
        discount_pct: 50.3,
        available_sizes: vec!["S".to_string(), "M".to_string()],
        category: "Jackets".to_string(),
        image_url: format!("{}/images/falketind.jpg", server.url()),
        locale: Locale::EnGb,
        scraped_at: Utc::now(),
    };
    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots.replace(Locale::EnGb, std::slice::from_ref(&existing)).await.unwrap();

    let pipeline =
        build_pipeline(&server, vec![subscriber(Locale::EnGb, Vec::new())], snapshots);
    pipeline.scheduler.run_cycle().await;

    assert!(pipeline.mail.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_restock_of_the_preferred_size_alerts_the_subscriber() {
    let mut server = mockito::Server::new_async().await;
    stub_outlet(&mut server).await;

    // Size M is new relative to the reference state.
    let existing = ProductSnapshot {
        name: "Falketind Gore-Tex Jacket".to_string(),
        url: format!("{}/en-GB/products/falketind-jacket", server.url()),
        price: 199.0,
        original_price: 400.0,
        discount_pct: 50.3,
        available_sizes: vec!["S".to_string()],
        category: "Jackets".to_string(),
        image_url: format!("{}/images/falketind.jpg", server.url()),
        locale: Locale::EnGb,
        scraped_at: Utc::now(),
    };
    let snapshots = Arc::new(MemorySnapshotStore::new());
    snapshots.replace(Locale::EnGb, std::slice::from_ref(&existing)).await.unwrap();

    let mut subscriber = subscriber(Locale::EnGb, Vec::new());
    subscriber.preferences.size_map.insert("Jackets".to_string(), "M".to_string());

    let pipeline = build_pipeline(&server, vec![subscriber], snapshots);
    pipeline.scheduler.run_cycle().await;

    let mails = pipeline.mail.sent.lock().unwrap();
    assert_eq!(mails.len(), 1);
    assert!(mails[0].2.contains("Back in Stock"));
}

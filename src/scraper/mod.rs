//! Outlet page fetching and parsing.
//!
//! One [`OutletScraper`] instance exists per locale. Every instance owns its
//! private pacing and throttle state, so locales never contend on the same
//! rate limiter. The scrape pipeline is: cycle throttle -> robots gate ->
//! resilient fetch -> parse -> rendering fallback when the lightweight fetch
//! yields no parseable products.

pub mod error;
pub mod parser;
pub mod render;
mod robots;

use std::{sync::Arc, time::Instant};

use reqwest::header;
use tokio::sync::Mutex;
use url::Url;

pub use error::ScrapeError;
pub use parser::ProductParser;
pub(crate) use parser::PRODUCT_CARD_SELECTOR;
pub use render::{HttpRenderService, PageRenderer};
use robots::RobotsPolicy;

use crate::{
    config::{AppConfig, RetryConfig},
    models::{Locale, ProductSnapshot},
};

/// Outbound client identities, rotated per request.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) \
     Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.2; rv:121.0) Gecko/20100101 Firefox/121.0",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A per-locale product catalog the scheduler can observe.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// The locale this source observes.
    fn locale(&self) -> Locale;

    /// Produces the current product list, or an empty list when a policy
    /// refusal skips the cycle.
    async fn scrape(&self) -> Result<Vec<ProductSnapshot>, ScrapeError>;
}

#[async_trait::async_trait]
impl CatalogSource for OutletScraper {
    fn locale(&self) -> Locale {
        self.locale
    }

    async fn scrape(&self) -> Result<Vec<ProductSnapshot>, ScrapeError> {
        OutletScraper::scrape(self).await
    }
}

/// Private, single-writer pacing state of one scraper instance.
#[derive(Debug, Default)]
struct ScraperState {
    last_request: Option<Instant>,
    last_scrape: Option<Instant>,
    /// Cached robots verdict; the policy is fetched at most once per
    /// instance lifetime.
    robots_allowed: Option<bool>,
}

/// Fetches and parses one locale's outlet page with politeness and
/// resilience controls.
pub struct OutletScraper {
    locale: Locale,
    outlet_url: Url,
    min_request_delay: std::time::Duration,
    cycle_interval: std::time::Duration,
    fetch_retry: RetryConfig,
    client: reqwest::Client,
    renderer: Option<Arc<dyn PageRenderer>>,
    parser: ProductParser,
    state: Mutex<ScraperState>,
}

impl OutletScraper {
    /// Creates a scraper for `locale` against `outlet_url`.
    pub fn new(
        locale: Locale,
        outlet_url: Url,
        config: &AppConfig,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, ScrapeError> {
        let base_url = outlet_url.join("/").map_err(|source| ScrapeError::InvalidUrl {
            url: outlet_url.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(ScrapeError::ClientBuild)?;

        Ok(Self {
            parser: ProductParser::new(locale, base_url)?,
            locale,
            outlet_url,
            min_request_delay: config.min_request_delay,
            cycle_interval: config.cycle_interval,
            fetch_retry: config.fetch_retry.clone(),
            client,
            renderer,
            state: Mutex::new(ScraperState::default()),
        })
    }

    /// The locale this scraper observes.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Runs the full scrape pipeline.
    ///
    /// Policy refusals (cycle throttle, robots disallow) return an empty
    /// list. A fetch that keeps failing after the bounded retry loop, or a
    /// failing rendering fallback, surfaces as an error for the caller to
    /// absorb.
    pub async fn scrape(&self) -> Result<Vec<ProductSnapshot>, ScrapeError> {
        {
            let state = self.state.lock().await;
            if let Some(last) = state.last_scrape {
                if last.elapsed() < self.cycle_interval {
                    let remaining = self.cycle_interval - last.elapsed();
                    tracing::info!(
                        locale = %self.locale,
                        remaining_secs = remaining.as_secs(),
                        "Scrape throttled; cycle interval has not elapsed."
                    );
                    return Ok(Vec::new());
                }
            }
        }

        if !self.robots_allows().await {
            tracing::warn!(locale = %self.locale, "Scrape blocked by robots.txt.");
            return Ok(Vec::new());
        }

        let html = self.fetch_page(&self.outlet_url).await?;
        let mut products = self.parser.parse(&html);

        if products.is_empty() {
            tracing::info!(
                locale = %self.locale,
                "No products in lightweight fetch; trying the rendering fallback."
            );
            let renderer = self.renderer.as_ref().ok_or(ScrapeError::RendererUnavailable)?;
            let rendered = renderer.render(self.outlet_url.as_str(), self.locale).await?;
            products = self.parser.parse(&rendered);
        }

        self.state.lock().await.last_scrape = Some(Instant::now());
        tracing::info!(locale = %self.locale, count = products.len(), "Scrape complete.");
        Ok(products)
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
    }

    /// Sleeps out the remainder of the minimum delay window between two
    /// outbound requests of this instance.
    async fn enforce_request_delay(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_request_delay {
                let wait = self.min_request_delay - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Pacing outbound request.");
                tokio::time::sleep(wait).await;
            }
        }
        state.last_request = Some(Instant::now());
    }

    /// Robots gate. Fetched once per instance; fetch failure or a missing
    /// policy counts as allowed.
    async fn robots_allows(&self) -> bool {
        {
            let state = self.state.lock().await;
            if let Some(allowed) = state.robots_allowed {
                return allowed;
            }
        }

        let allowed = match self.outlet_url.join("/robots.txt") {
            Ok(robots_url) => self.check_robots(&robots_url).await,
            Err(_) => true,
        };

        self.state.lock().await.robots_allowed = Some(allowed);
        allowed
    }

    async fn check_robots(&self, robots_url: &Url) -> bool {
        self.enforce_request_delay().await;
        let response = self
            .client
            .get(robots_url.clone())
            .header(header::USER_AGENT, Self::random_user_agent())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    let policy = RobotsPolicy::parse(&body);
                    let allowed = policy.allows(USER_AGENTS[0], self.outlet_url.path());
                    tracing::info!(%robots_url, allowed, "robots.txt checked.");
                    allowed
                }
                Err(e) => {
                    tracing::warn!(%robots_url, error = %e, "robots.txt unreadable; assuming allowed.");
                    true
                }
            },
            Ok(response) => {
                tracing::info!(
                    %robots_url,
                    status = %response.status(),
                    "No robots.txt found; assuming allowed."
                );
                true
            }
            Err(e) => {
                tracing::warn!(%robots_url, error = %e, "robots.txt fetch failed; assuming allowed.");
                true
            }
        }
    }

    /// Fetches page markup with a bounded retry loop and exponential
    /// backoff between attempts.
    async fn fetch_page(&self, url: &Url) -> Result<String, ScrapeError> {
        let attempts = self.fetch_retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.enforce_request_delay().await;

            let result = self
                .client
                .get(url.clone())
                .header(header::USER_AGENT, Self::random_user_agent())
                .header(header::ACCEPT, ACCEPT_HTML)
                .header(header::ACCEPT_LANGUAGE, self.locale.as_str())
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(response) => match response.text().await {
                    Ok(body) => {
                        tracing::info!(%url, attempt, "Page fetched.");
                        return Ok(body);
                    }
                    Err(e) => last_error = e.to_string(),
                },
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                let backoff = self.fetch_retry.backoff_delay(attempt - 1);
                tracing::warn!(
                    %url,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_error,
                    "Fetch failed; retrying."
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ScrapeError::RetriesExhausted { url: url.to_string(), attempts, reason: last_error })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{render::MockPageRenderer, *};

    const PRODUCT_PAGE: &str = r#"
        <li class="product-card">
          <a class="product-card__link" href="/en-GB/products/senja-shorts">
            <h3 class="product-card__title">Senja Flex1 Shorts</h3>
          </a>
          <span class="product-card__price--sale">£79.00</span>
          <ul class="product-card__sizes"><li>M</li></ul>
        </li>"#;

    fn test_config() -> AppConfig {
        AppConfig {
            min_request_delay: Duration::ZERO,
            fetch_retry: RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                backoff_base: 2,
            },
            ..AppConfig::default()
        }
    }

    fn outlet_scraper(server: &mockito::Server, renderer: Option<Arc<dyn PageRenderer>>) -> OutletScraper {
        let outlet_url = Url::parse(&format!("{}/en-GB/outlet/", server.url())).unwrap();
        OutletScraper::new(Locale::EnGb, outlet_url, &test_config(), renderer).unwrap()
    }

    #[tokio::test]
    async fn scrape_parses_products_from_outlet_page() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/robots.txt").with_status(404).create_async().await;
        let page = server
            .mock("GET", "/en-GB/outlet/")
            .with_status(200)
            .with_body(PRODUCT_PAGE)
            .create_async()
            .await;

        let scraper = outlet_scraper(&server, None);
        let products = scraper.scrape().await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Senja Flex1 Shorts");
        page.assert_async().await;
    }

    #[tokio::test]
    async fn second_scrape_within_cycle_interval_is_throttled() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/robots.txt").with_status(404).create_async().await;
        server
            .mock("GET", "/en-GB/outlet/")
            .with_status(200)
            .with_body(PRODUCT_PAGE)
            .expect(1)
            .create_async()
            .await;

        let scraper = outlet_scraper(&server, None);
        assert_eq!(scraper.scrape().await.unwrap().len(), 1);
        assert!(scraper.scrape().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn robots_disallow_skips_the_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /")
            .create_async()
            .await;
        let page = server.mock("GET", "/en-GB/outlet/").expect(0).create_async().await;

        let scraper = outlet_scraper(&server, None);
        assert!(scraper.scrape().await.unwrap().is_empty());
        page.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_retries_three_times_before_failing() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/robots.txt").with_status(404).create_async().await;
        let page = server
            .mock("GET", "/en-GB/outlet/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let scraper = outlet_scraper(&server, None);
        let result = scraper.scrape().await;

        assert!(matches!(result, Err(ScrapeError::RetriesExhausted { attempts: 3, .. })));
        page.assert_async().await;
    }

    #[tokio::test]
    async fn rendering_fallback_kicks_in_when_no_products_parse() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/robots.txt").with_status(404).create_async().await;
        server
            .mock("GET", "/en-GB/outlet/")
            .with_status(200)
            .with_body("<html><body>loading…</body></html>")
            .create_async()
            .await;

        let mut renderer = MockPageRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_, _| Ok(PRODUCT_PAGE.to_string()));

        let scraper = outlet_scraper(&server, Some(Arc::new(renderer)));
        let products = scraper.scrape().await.unwrap();
        assert_eq!(products.len(), 1);
    }

    #[tokio::test]
    async fn missing_renderer_propagates_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/robots.txt").with_status(404).create_async().await;
        server
            .mock("GET", "/en-GB/outlet/")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let scraper = outlet_scraper(&server, None);
        assert!(matches!(scraper.scrape().await, Err(ScrapeError::RendererUnavailable)));
    }
}

//! Client for the JavaScript-capable page rendering service.
//!
//! Some outlet pages populate their product grid client-side; when the
//! lightweight fetch parses to zero products the scraper asks a rendering
//! service to load the page in a real browser engine and return the settled
//! markup.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::error::ScrapeError;
use crate::models::Locale;

/// How long to give the rendering service; browser navigation plus waiting
/// for the product grid is slow.
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// A fetch path capable of executing page JavaScript.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders the page at `url` and returns its settled HTML.
    async fn render(&self, url: &str, locale: Locale) -> Result<String, ScrapeError>;
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    html: String,
}

/// [`PageRenderer`] backed by an HTTP rendering service.
pub struct HttpRenderService {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpRenderService {
    /// Creates a client for the rendering service at `endpoint`.
    pub fn new(endpoint: Url) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(RENDER_TIMEOUT)
            .build()
            .map_err(ScrapeError::ClientBuild)?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait::async_trait]
impl PageRenderer for HttpRenderService {
    async fn render(&self, url: &str, locale: Locale) -> Result<String, ScrapeError> {
        tracing::info!(url, %locale, "Requesting rendered page markup.");

        let body = json!({
            "url": url,
            "locale": locale.as_str(),
            "wait_for": super::PRODUCT_CARD_SELECTOR,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::RenderFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::RenderFailed(format!(
                "render service returned status {status}"
            )));
        }

        let rendered: RenderResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::RenderFailed(e.to_string()))?;

        Ok(rendered.html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_rendered_html() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"html":"<html><body>rendered</body></html>"}"#)
            .create_async()
            .await;

        let service = HttpRenderService::new(Url::parse(&server.url()).unwrap()).unwrap();
        let html = service.render("https://example.com/outlet/", Locale::EnGb).await.unwrap();

        assert!(html.contains("rendered"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn service_error_is_propagated() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").with_status(502).create_async().await;

        let service = HttpRenderService::new(Url::parse(&server.url()).unwrap()).unwrap();
        let result = service.render("https://example.com/outlet/", Locale::EnGb).await;

        assert!(matches!(result, Err(ScrapeError::RenderFailed(_))));
    }
}

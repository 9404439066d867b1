//! Error types for the fetch and parse stages.

use thiserror::Error;

/// Errors that can occur while scraping an outlet page.
///
/// Policy refusals (robots disallow, cycle throttle) are not errors; they
/// surface as an empty product list instead.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Building the shared HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// One of the structural CSS selectors failed to compile.
    #[error("invalid product selector: {0}")]
    Selector(String),

    /// The outlet URL cannot be resolved against its own origin.
    #[error("invalid outlet URL {url}: {source}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// The underlying parse failure.
        #[source]
        source: url::ParseError,
    },

    /// A page request kept failing after the bounded retry loop.
    #[error("request for {url} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// The URL that could not be fetched.
        url: String,
        /// How many attempts were made.
        attempts: u32,
        /// The error of the final attempt.
        reason: String,
    },

    /// The rendering fallback was needed but no render service is
    /// configured.
    #[error("render service is not configured")]
    RendererUnavailable,

    /// The rendering service failed to produce page markup.
    #[error("render service request failed: {0}")]
    RenderFailed(String),
}

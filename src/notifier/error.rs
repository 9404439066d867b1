//! Error types for alert delivery.

use thiserror::Error;

/// Errors raised by channel senders. Notifiers absorb these after retry
/// exhaustion and report a boolean outcome instead.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Rendering the message template failed.
    #[error("template rendering failed: {0}")]
    Template(#[from] minijinja::Error),

    /// Building the channel HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// A delivery URL could not be constructed.
    #[error("invalid delivery URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A web push device token is not a valid subscription document.
    #[error("invalid device token: {0}")]
    InvalidDeviceToken(String),

    /// The transport failed before a provider verdict was reached.
    #[error("delivery request failed: {0}")]
    Request(String),

    /// The provider rejected the delivery.
    #[error("provider rejected delivery with status {status}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
    },
}

//! Configuration module for Varsel.

mod app_config;
mod helpers;
mod retry;

pub use app_config::{ApnsConfig, AppConfig, EmailConfig, OutletUrls, WebPushConfig};
pub use helpers::{
    deserialize_duration_from_minutes, deserialize_duration_from_ms,
    deserialize_duration_from_seconds,
};
pub use retry::RetryConfig;

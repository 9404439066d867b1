//! Serde helpers for configuration fields.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes a [`Duration`] from a plain number of milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a [`Duration`] from a plain number of seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Deserializes a [`Duration`] from a plain number of minutes.
pub fn deserialize_duration_from_minutes<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(minutes * 60))
}

//! Retry policy shared by the fetcher and the delivery channels.

use std::time::Duration;

use serde::Deserialize;

use super::helpers::deserialize_duration_from_ms;

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_base() -> u32 {
    2
}

/// Bounded retry policy with exponential backoff.
///
/// The attempt ceiling and the doubling delay growth are an observable
/// contract of the pipeline, so callers run an explicit loop with an attempt
/// counter and ask this policy for the delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(
        default = "default_initial_backoff",
        deserialize_with = "deserialize_duration_from_ms",
        rename = "initial_backoff_ms"
    )]
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after every failed attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,
}

impl RetryConfig {
    /// The delay to sleep after the given zero-based failed attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.initial_backoff * self.backoff_base.saturating_pow(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            backoff_base: default_backoff_base(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(retry.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(retry.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn default_attempt_ceiling_is_three() {
        assert_eq!(RetryConfig::default().max_attempts, 3);
    }
}

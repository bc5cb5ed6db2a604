//! Exponential Retry
//!
//! Bounds how many times a router rescans its model pool and how long it
//! waits between scans.

use crate::config::duration;
use crate::error::{GatewayError, Result};
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 disables retrying, there is no unlimited mode.
    pub max_retries: u32,

    /// Delay multiplier between consecutive retries
    pub base_multiplier: f64,

    /// Delay before the first retry
    #[serde(with = "duration::serde_str")]
    pub min_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "duration::serde_str")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_multiplier: 2.0,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Retry template. Each request takes its own iterator from it.
#[derive(Debug, Clone)]
pub struct ExpRetry {
    max_retries: u32,
    multiplier: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl ExpRetry {
    pub fn new(max_retries: u32, multiplier: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            // a multiplier below 1 would shrink delays
            multiplier: multiplier.max(1.0),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.base_multiplier,
            config.min_delay,
            config.max_delay,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Reference schedule the iterator's backoff must follow:
    /// `min(max_delay, min_delay * multiplier^n)` before the n-th retry (0-based)
    #[cfg(test)]
    fn delay(&self, retry: u32) -> Duration {
        let scaled = self.min_delay.as_secs_f64() * self.multiplier.powi(retry as i32);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// Start a fresh attempt sequence
    pub fn iterator(&self) -> RetryIterator {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.min_delay)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_delay)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();

        RetryIterator {
            attempts: 0,
            max_attempts: self.max_retries.saturating_add(1),
            backoff,
        }
    }
}

impl Default for ExpRetry {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Stateful attempt sequence for a single request
#[derive(Debug)]
pub struct RetryIterator {
    attempts: u32,
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryIterator {
    /// Whether another attempt is allowed
    pub fn has_next(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start the next attempt.
    ///
    /// The first attempt starts right away; later ones sleep for the backoff
    /// delay first. Returns `Cancelled` as soon as the token fires.
    pub async fn wait_next(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        if self.attempts > 0 {
            let delay = self.next_delay();

            tokio::select! {
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.attempts += 1;
        Ok(())
    }

    fn next_delay(&mut self) -> Duration {
        // never None: max_elapsed_time is disabled
        self.backoff
            .next_backoff()
            .unwrap_or(self.backoff.max_interval)
    }
}

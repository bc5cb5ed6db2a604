//! Resiliency Module
//!
//! Per-model health tracking and pool-wide retry.

pub mod health;
pub mod retry;

pub use health::{ErrorBudget, HealthTracker};
pub use retry::{ExpRetry, RetryConfig, RetryIterator};

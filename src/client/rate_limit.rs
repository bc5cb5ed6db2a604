//! Rate Limit Detection
//!
//! Recognizes provider throttling and reads how long the provider wants us
//! to back off.

use crate::config::duration::parse_duration;
use crate::resiliency::health::MAX_RATE_LIMIT_COOLDOWN;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Headers consulted for the back-off time, most specific first
const RETRY_AFTER_HEADERS: [&str; 3] = [
    "retry-after",
    "x-ratelimit-reset-requests",
    "x-ratelimit-reset-tokens",
];

/// Detect if a response indicates a rate limit error
pub fn is_rate_limit_error(status: u16, body: &str) -> bool {
    // HTTP 429 Too Many Requests
    if status == 429 {
        return true;
    }

    // Some providers return 400 or 403 with rate limit messages
    let lower_body = body.to_lowercase();
    lower_body.contains("rate limit")
        || lower_body.contains("rate_limit")
        || lower_body.contains("too many requests")
        || lower_body.contains("quota exceeded")
}

/// Read the back-off time from rate limit headers.
///
/// Values are either plain seconds ("20") or duration strings ("1m30s").
/// Anything longer than `MAX_RATE_LIMIT_COOLDOWN` is capped to it.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    RETRY_AFTER_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?.trim();

        let wait = match value.parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs >= 0.0 => {
                Duration::try_from_secs_f64(secs).unwrap_or(MAX_RATE_LIMIT_COOLDOWN)
            }
            Ok(_) => return None,
            Err(_) => parse_duration(value)?,
        };

        Some(wait.min(MAX_RATE_LIMIT_COOLDOWN))
    })
}

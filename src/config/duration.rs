//! Duration Strings
//!
//! Parses human-friendly durations ("500ms", "2s", "1m30s", "1h") used in
//! config files and provider rate limit headers.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a duration string like "1m30s" or "2h" into a Duration
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    // Handle milliseconds first
    if let Some(stripped) = s.strip_suffix("ms") {
        return stripped.trim().parse::<u64>().ok().map(Duration::from_millis);
    }

    // Complex format (e.g., "1m30s", "2h30m")
    if s.contains('h') || (s.contains('m') && s.contains('s')) {
        let mut total_secs = 0u64;
        let mut current_num = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
            } else if !current_num.is_empty() {
                let n = current_num.parse::<u64>().ok()?;
                let secs = match c {
                    'h' => n.checked_mul(3600)?,
                    'm' => n.checked_mul(60)?,
                    's' => n,
                    _ => return None,
                };
                total_secs = total_secs.checked_add(secs)?;
                current_num.clear();
            } else {
                return None;
            }
        }

        if current_num.is_empty() && total_secs > 0 {
            return Some(Duration::from_secs(total_secs));
        }
        return None;
    }

    // Simple cases - single unit
    if let Some(stripped) = s.strip_suffix('s') {
        return stripped
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    }
    if let Some(stripped) = s.strip_suffix('m') {
        return stripped
            .parse::<u64>()
            .ok()
            .and_then(|mins| mins.checked_mul(60))
            .map(Duration::from_secs);
    }

    None
}

/// Format a duration the way `parse_duration` reads it back
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }

    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Serde adapter for `Duration` fields written as strings
pub mod serde_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{}'", raw)))
    }
}

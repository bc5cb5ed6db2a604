//! Model Health Tracking
//!
//! A model is healthy while it stays within its error budget and is not
//! cooling down after a rate limit. Both conditions heal on their own as
//! time passes.

use crate::config::duration::{format_duration, parse_duration};
use crate::error::ProviderError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Cooldown applied when a provider rate limits us without saying for how long
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Longest cooldown a provider may put a model on
pub const MAX_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(3600);

/// How many errors a model may produce within a time window.
///
/// Written as `"<budget>/<window>"` in config. The window is a bare unit
/// (`"10/m"`, `"3/s"`) or a duration string (`"5/30s"`, `"2/1500ms"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ErrorBudget {
    budget: u32,
    window: Duration,
}

impl ErrorBudget {
    pub fn new(budget: u32, window: Duration) -> Self {
        Self { budget, window }
    }

    /// Max errors tolerated per window
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl FromStr for ErrorBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (budget, unit) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid error budget '{}', expected '<budget>/<unit>'", s))?;

        let budget = budget
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid error budget '{}': budget must be a number", s))?;

        let window = match unit.trim() {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(3600),
            other => parse_duration(other)
                .filter(|window| !window.is_zero())
                .ok_or_else(|| {
                    format!(
                        "invalid error budget '{}': unknown window '{}', use ms, s, m, h or a duration like 30s",
                        s, other
                    )
                })?,
        };

        if budget == 0 {
            return Err(format!("invalid error budget '{}': budget must be positive", s));
        }

        Ok(Self { budget, window })
    }
}

impl TryFrom<String> for ErrorBudget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ErrorBudget> for String {
    fn from(budget: ErrorBudget) -> Self {
        budget.to_string()
    }
}

impl fmt::Display for ErrorBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.window.as_millis() {
            1 => "ms",
            1_000 => "s",
            60_000 => "m",
            3_600_000 => "h",
            _ => return write!(f, "{}/{}", self.budget, format_duration(self.window)),
        };
        write!(f, "{}/{}", self.budget, unit)
    }
}

/// Fixed-window error counter
#[derive(Debug)]
struct BudgetWindow {
    started_at: Instant,
    consumed: u32,
}

/// Tracks the health of a single model
#[derive(Debug)]
pub struct HealthTracker {
    budget: ErrorBudget,

    /// Errors consumed in the current window
    window: Mutex<BudgetWindow>,

    /// Time until which the model is rate limited (if any)
    rate_limited_until: RwLock<Option<Instant>>,
}

impl HealthTracker {
    pub fn new(budget: ErrorBudget) -> Self {
        Self {
            budget,
            window: Mutex::new(BudgetWindow {
                started_at: Instant::now(),
                consumed: 0,
            }),
            rate_limited_until: RwLock::new(None),
        }
    }

    pub fn budget(&self) -> &ErrorBudget {
        &self.budget
    }

    /// Check whether the model may serve requests
    pub fn is_healthy(&self) -> bool {
        self.is_healthy_at(Instant::now())
    }

    pub(crate) fn is_healthy_at(&self, now: Instant) -> bool {
        if self.is_rate_limited_at(now) {
            return false;
        }

        let mut window = self.window.lock();
        Self::roll_window(&mut window, self.budget.window, now);
        window.consumed < self.budget.budget
    }

    /// Check if the model is cooling down after a rate limit
    pub fn is_rate_limited(&self) -> bool {
        self.is_rate_limited_at(Instant::now())
    }

    fn is_rate_limited_at(&self, now: Instant) -> bool {
        matches!(*self.rate_limited_until.read(), Some(until) if now < until)
    }

    /// Consume one unit of the error budget
    pub fn record_error(&self) {
        self.record_error_at(Instant::now());
    }

    pub(crate) fn record_error_at(&self, now: Instant) {
        let mut window = self.window.lock();
        Self::roll_window(&mut window, self.budget.window, now);
        window.consumed = window.consumed.saturating_add(1);
    }

    /// Take the model out of rotation until `reset_at`
    pub fn record_rate_limited(&self, reset_at: Instant) {
        let mut guard = self.rate_limited_until.write();
        // a later cooldown always wins over an earlier one
        if guard.map_or(true, |until| until < reset_at) {
            *guard = Some(reset_at);
        }
    }

    /// Route a provider error to the right counter
    pub fn track_error(&self, err: &ProviderError) {
        match err {
            ProviderError::RateLimited { retry_after, .. } => {
                let cooldown = retry_after
                    .unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN)
                    .min(MAX_RATE_LIMIT_COOLDOWN);
                if let Some(reset_at) = Instant::now().checked_add(cooldown) {
                    self.record_rate_limited(reset_at);
                }
            }
            ProviderError::Cancelled => {}
            _ => self.record_error(),
        }
    }

    fn roll_window(window: &mut BudgetWindow, length: Duration, now: Instant) {
        if now.saturating_duration_since(window.started_at) >= length {
            window.started_at = now;
            window.consumed = 0;
        }
    }
}

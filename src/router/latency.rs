//! Latency Tracking
//!
//! Exponentially decayed moving average of model latency, used by the
//! least-latency routing strategy.

use crate::config::duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Latency tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Weight of the newest sample once warmed up
    pub decay: f64,

    /// Samples averaged plainly before decay kicks in
    pub warmup_samples: u32,

    /// How long a latency estimate stays trustworthy without new samples
    #[serde(with = "duration::serde_str")]
    pub update_interval: Duration,

    /// Stream chunks arriving faster than this were already buffered and are not sampled
    #[serde(with = "duration::serde_str")]
    pub chunk_wait_threshold: Duration,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            decay: 0.06,
            warmup_samples: 3,
            update_interval: Duration::from_secs(30),
            chunk_wait_threshold: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Default)]
struct AverageState {
    value: f64,
    count: u32,
    updated_at: Option<Instant>,
}

/// Moving average of latency samples (in milliseconds)
#[derive(Debug)]
pub struct MovingAverage {
    decay: f64,
    warmup_samples: u32,
    state: Mutex<AverageState>,
}

impl MovingAverage {
    pub fn new(decay: f64, warmup_samples: u32) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            warmup_samples,
            state: Mutex::new(AverageState::default()),
        }
    }

    pub fn from_config(config: &LatencyConfig) -> Self {
        Self::new(config.decay, config.warmup_samples)
    }

    /// Record a sample
    pub fn add(&self, sample: f64) {
        let mut state = self.state.lock();

        if state.count < self.warmup_samples || state.count == 0 {
            // running arithmetic mean
            state.count += 1;
            state.value += (sample - state.value) / f64::from(state.count);
        } else {
            state.value = state.value * (1.0 - self.decay) + sample * self.decay;
            state.count = state.count.saturating_add(1);
        }

        state.updated_at = Some(Instant::now());
    }

    /// Record a duration sample
    pub fn add_duration(&self, elapsed: Duration) {
        self.add(elapsed.as_secs_f64() * 1000.0);
    }

    /// Force the estimate to a value, treating the model as warmed up
    pub fn set(&self, value: f64) {
        let mut state = self.state.lock();
        state.value = value;
        state.count = state.count.max(self.warmup_samples).max(1);
        state.updated_at = Some(Instant::now());
    }

    /// Current estimate, `None` until the first sample
    pub fn value(&self) -> Option<f64> {
        let state = self.state.lock();
        (state.count > 0).then_some(state.value)
    }

    /// Number of samples seen
    pub fn samples(&self) -> u32 {
        self.state.lock().count
    }

    /// Whether still in warm-up
    pub fn warming_up(&self) -> bool {
        self.state.lock().count < self.warmup_samples
    }

    /// True when no sample arrived within `interval`
    pub fn is_stale(&self, interval: Duration) -> bool {
        match self.state.lock().updated_at {
            Some(at) => at.elapsed() > interval,
            None => true,
        }
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::from_config(&LatencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unknown_before_samples() {
        let avg = MovingAverage::new(0.06, 3);
        assert_eq!(avg.value(), None);
        assert!(avg.warming_up());
        assert!(avg.is_stale(Duration::from_secs(30)));
    }

    #[test]
    fn test_plain_mean_during_warmup() {
        let avg = MovingAverage::new(0.5, 3);

        avg.add(10.0);
        assert_eq!(avg.value(), Some(10.0));

        avg.add(20.0);
        avg.add(30.0);
        assert_eq!(avg.value(), Some(20.0));
        assert!(!avg.warming_up());
    }

    #[test]
    fn test_decay_after_warmup() {
        let avg = MovingAverage::new(0.5, 1);

        avg.add(100.0);
        avg.add(200.0);
        assert_eq!(avg.value(), Some(150.0));

        avg.add(150.0);
        assert_eq!(avg.value(), Some(150.0));
    }

    #[test]
    fn test_zero_warmup_seeds_with_first_sample() {
        let avg = MovingAverage::new(0.1, 0);
        avg.add(40.0);
        assert_eq!(avg.value(), Some(40.0));
    }

    #[test]
    fn test_set_skips_warmup() {
        let avg = MovingAverage::new(0.5, 3);
        avg.set(42.0);
        assert_eq!(avg.value(), Some(42.0));

        avg.add(58.0);
        assert_eq!(avg.value(), Some(50.0));
        assert!(!avg.is_stale(Duration::from_secs(30)));
    }

    #[test]
    fn test_concurrent_updates() {
        let avg = Arc::new(MovingAverage::new(0.06, 1000));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let avg = avg.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        avg.add(5.0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(avg.samples(), 800);
        assert_eq!(avg.value(), Some(5.0));
    }
}

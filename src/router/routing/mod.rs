//! Routing Strategies
//!
//! A strategy decides in which order a router walks its model pool. Every call
//! to [`LangModelRouting::iter`] returns a fresh iterator over the models that
//! are healthy right now; `None` from the iterator means no healthy model is
//! left for this attempt.

pub mod least_latency;
pub mod priority;
pub mod round_robin;
pub mod weighted_round_robin;

pub use least_latency::LeastLatencyRouting;
pub use priority::PriorityRouting;
pub use round_robin::RoundRobinRouting;
pub use weighted_round_robin::WeightedRoundRobinRouting;

use crate::model::Model;
use crate::router::latency::MovingAverage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Iterator over healthy models of a pool
pub type ModelIterator<'a, M> = Box<dyn Iterator<Item = Arc<M>> + Send + 'a>;

/// Picks the latency estimate a least-latency strategy compares
pub type LatencyGetter<M> = fn(&M) -> &MovingAverage;

/// A model selection strategy over a fixed pool
pub trait LangModelRouting<M: Model>: Send + Sync {
    fn iter(&self) -> ModelIterator<'_, M>;
}

/// Available routing strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// First healthy model in config order
    #[default]
    Priority,
    /// Rotate through healthy models
    RoundRobin,
    /// Rotate through healthy models proportionally to their weight
    WeightedRoundRobin,
    /// Fastest healthy model by observed latency
    LeastLatency,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::Priority => "priority",
            RoutingStrategy::RoundRobin => "round_robin",
            RoutingStrategy::WeightedRoundRobin => "weighted_round_robin",
            RoutingStrategy::LeastLatency => "least_latency",
        }
    }

    /// Instantiate the strategy over a pool
    pub fn build<M: Model + 'static>(
        self,
        models: Vec<Arc<M>>,
        latency: LatencyGetter<M>,
    ) -> Box<dyn LangModelRouting<M>> {
        match self {
            RoutingStrategy::Priority => Box::new(PriorityRouting::new(models)),
            RoutingStrategy::RoundRobin => Box::new(RoundRobinRouting::new(models)),
            RoutingStrategy::WeightedRoundRobin => {
                Box::new(WeightedRoundRobinRouting::new(models))
            }
            RoutingStrategy::LeastLatency => Box::new(LeastLatencyRouting::new(models, latency)),
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Model with switchable health
    #[derive(Debug)]
    pub struct TestModel {
        pub id: String,
        pub healthy: AtomicBool,
        pub weight: u32,
        pub latency: MovingAverage,
        pub update_interval: Duration,
    }

    impl TestModel {
        pub fn new(id: &str) -> Arc<Self> {
            Self::weighted(id, 1)
        }

        pub fn weighted(id: &str, weight: u32) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                healthy: AtomicBool::new(true),
                weight,
                latency: MovingAverage::default(),
                update_interval: Duration::from_secs(30),
            })
        }

        pub fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        pub fn latency(&self) -> &MovingAverage {
            &self.latency
        }
    }

    impl Model for TestModel {
        fn id(&self) -> &str {
            &self.id
        }

        fn healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }

        fn weight(&self) -> u32 {
            self.weight
        }

        fn latency_update_interval(&self) -> Duration {
            self.update_interval
        }
    }

    /// Collect the IDs of the next `n` picks
    pub fn take_ids(iter: &mut ModelIterator<'_, TestModel>, n: usize) -> Vec<String> {
        iter.take(n).map(|m| m.id.clone()).collect()
    }
}

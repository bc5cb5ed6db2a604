//! Least latency routing: send traffic to the fastest healthy model.
//!
//! Models without a fresh latency estimate win over measured ones, so new
//! and long-idle models keep getting re-measured.

use super::{LangModelRouting, LatencyGetter, ModelIterator};
use crate::model::Model;
use std::sync::Arc;

pub struct LeastLatencyRouting<M> {
    models: Vec<Arc<M>>,
    latency: LatencyGetter<M>,
}

impl<M: Model> LeastLatencyRouting<M> {
    pub fn new(models: Vec<Arc<M>>, latency: LatencyGetter<M>) -> Self {
        Self { models, latency }
    }

    /// Latency estimate to rank by, `None` when unknown or outdated
    fn estimate(&self, model: &M) -> Option<f64> {
        let average = (self.latency)(model);
        if average.is_stale(model.latency_update_interval()) {
            return None;
        }

        average.value()
    }

    fn fastest_healthy(&self) -> Option<Arc<M>> {
        let mut best: Option<(&Arc<M>, f64)> = None;

        for model in self.models.iter().filter(|m| m.healthy()) {
            let Some(latency) = self.estimate(model) else {
                return Some(model.clone());
            };

            // strict comparison keeps config order on ties
            if best.map_or(true, |(_, best_latency)| latency < best_latency) {
                best = Some((model, latency));
            }
        }

        best.map(|(model, _)| model.clone())
    }
}

impl<M: Model + 'static> LangModelRouting<M> for LeastLatencyRouting<M> {
    fn iter(&self) -> ModelIterator<'_, M> {
        Box::new(std::iter::from_fn(move || self.fastest_healthy()))
    }
}

impl<M: Model> std::fmt::Debug for LeastLatencyRouting<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<_> = self.models.iter().map(|m| m.id()).collect();
        f.debug_struct("LeastLatencyRouting")
            .field("models", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestModel;
    use super::*;
    use crate::router::latency::MovingAverage;
    use std::time::Duration;

    fn routing(models: &[Arc<TestModel>]) -> LeastLatencyRouting<TestModel> {
        LeastLatencyRouting::new(models.to_vec(), TestModel::latency)
    }

    #[test]
    fn test_picks_fastest() {
        let models = vec![TestModel::new("a"), TestModel::new("b"), TestModel::new("c")];
        models[0].latency.set(120.0);
        models[1].latency.set(40.0);
        models[2].latency.set(80.0);

        assert_eq!(routing(&models).iter().next().unwrap().id, "b");
    }

    #[test]
    fn test_unsampled_model_wins() {
        let models = vec![TestModel::new("a"), TestModel::new("b")];
        models[0].latency.set(1.0);

        assert_eq!(routing(&models).iter().next().unwrap().id, "b");
    }

    #[test]
    fn test_ties_keep_config_order() {
        let models = vec![TestModel::new("a"), TestModel::new("b")];
        models[0].latency.set(50.0);
        models[1].latency.set(50.0);

        assert_eq!(routing(&models).iter().next().unwrap().id, "a");
    }

    #[test]
    fn test_skips_unhealthy() {
        let models = vec![TestModel::new("a"), TestModel::new("b")];
        models[0].latency.set(10.0);
        models[1].latency.set(90.0);
        models[0].set_healthy(false);

        let routing = routing(&models);
        assert_eq!(routing.iter().next().unwrap().id, "b");

        models[1].set_healthy(false);
        assert!(routing.iter().next().is_none());
    }

    #[test]
    fn test_stale_estimate_counts_as_unsampled() {
        let stale = Arc::new(TestModel {
            id: "stale".into(),
            healthy: true.into(),
            weight: 1,
            latency: MovingAverage::default(),
            update_interval: Duration::ZERO,
        });
        stale.latency.set(500.0);
        std::thread::sleep(Duration::from_millis(2));

        let fresh = TestModel::new("fresh");
        fresh.latency.set(10.0);

        let routing = routing(&[fresh, stale]);
        assert_eq!(routing.iter().next().unwrap().id, "stale");
    }
}

//! Weighted round robin routing.
//!
//! Each model is returned `weight` times in a row before the cursor moves on,
//! so over time every healthy model gets a share of traffic proportional to
//! its weight. Models with weight 0 never receive traffic.

use super::{LangModelRouting, ModelIterator};
use crate::model::Model;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct WeightedCursor {
    index: usize,
    /// Picks left for the model under the cursor
    credit: u32,
}

#[derive(Debug)]
pub struct WeightedRoundRobinRouting<M> {
    models: Vec<Arc<M>>,
    cursor: Mutex<WeightedCursor>,
}

impl<M: Model> WeightedRoundRobinRouting<M> {
    pub fn new(models: Vec<Arc<M>>) -> Self {
        let credit = models.first().map_or(0, |m| m.weight());

        Self {
            models,
            cursor: Mutex::new(WeightedCursor { index: 0, credit }),
        }
    }

    fn next_healthy(&self) -> Option<Arc<M>> {
        let len = self.models.len();
        let mut cursor = self.cursor.lock();

        // one extra step so the model under the cursor gets a fresh credit
        for _ in 0..=len {
            let Some(model) = self.models.get(cursor.index) else {
                break;
            };

            if cursor.credit > 0 && model.healthy() {
                cursor.credit -= 1;
                return Some(model.clone());
            }

            cursor.index = (cursor.index + 1) % len;
            cursor.credit = self.models[cursor.index].weight();
        }

        None
    }
}

impl<M: Model + 'static> LangModelRouting<M> for WeightedRoundRobinRouting<M> {
    fn iter(&self) -> ModelIterator<'_, M> {
        Box::new(std::iter::from_fn(move || self.next_healthy()))
    }
}

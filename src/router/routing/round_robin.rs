//! Round robin routing: spread requests evenly over healthy models.

use super::{LangModelRouting, ModelIterator};
use crate::model::Model;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The cursor is shared by every iterator of the same instance, so concurrent
/// requests keep rotating instead of all starting at the same model.
#[derive(Debug)]
pub struct RoundRobinRouting<M> {
    models: Vec<Arc<M>>,
    cursor: AtomicU64,
}

impl<M: Model> RoundRobinRouting<M> {
    pub fn new(models: Vec<Arc<M>>) -> Self {
        Self {
            models,
            cursor: AtomicU64::new(0),
        }
    }

    fn next_healthy(&self) -> Option<Arc<M>> {
        let len = self.models.len() as u64;

        for _ in 0..len {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            let model = &self.models[idx as usize];

            if model.healthy() {
                return Some(model.clone());
            }
        }

        None
    }
}

impl<M: Model + 'static> LangModelRouting<M> for RoundRobinRouting<M> {
    fn iter(&self) -> ModelIterator<'_, M> {
        Box::new(std::iter::from_fn(move || self.next_healthy()))
    }
}

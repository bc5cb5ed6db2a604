//! Priority routing: always prefer the earliest healthy model in config order.

use super::{LangModelRouting, ModelIterator};
use crate::model::Model;
use std::sync::Arc;

#[derive(Debug)]
pub struct PriorityRouting<M> {
    models: Vec<Arc<M>>,
}

impl<M: Model> PriorityRouting<M> {
    pub fn new(models: Vec<Arc<M>>) -> Self {
        Self { models }
    }
}

impl<M: Model + 'static> LangModelRouting<M> for PriorityRouting<M> {
    fn iter(&self) -> ModelIterator<'_, M> {
        Box::new(PriorityIter {
            models: &self.models,
            cursor: 0,
        })
    }
}

/// Walks the pool once, front to back. Never wraps.
struct PriorityIter<'a, M> {
    models: &'a [Arc<M>],
    cursor: usize,
}

impl<M: Model> Iterator for PriorityIter<'_, M> {
    type Item = Arc<M>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(model) = self.models.get(self.cursor) {
            self.cursor += 1;

            if model.healthy() {
                return Some(model.clone());
            }
        }

        None
    }
}

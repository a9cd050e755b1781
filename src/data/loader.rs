//! Batch iteration over a sample store

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::collate::{collate, Batch};
use super::store::SampleStore;
use crate::Result;

/// Iterates a store in fixed-size batches over a chosen index order
pub struct BatchLoader<'a> {
    store: &'a SampleStore,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<'a> BatchLoader<'a> {
    /// Visit the given indices in order
    pub fn with_indices(store: &'a SampleStore, order: Vec<usize>, batch_size: usize) -> Self {
        Self { store, order, batch_size: batch_size.max(1), cursor: 0 }
    }

    /// Visit every sample in store order
    pub fn sequential(store: &'a SampleStore, batch_size: usize) -> Self {
        Self::with_indices(store, (0..store.len()).collect(), batch_size)
    }

    /// Visit every sample in a shuffled order drawn from `rng`
    pub fn shuffled(store: &'a SampleStore, batch_size: usize, rng: &mut StdRng) -> Self {
        let mut order: Vec<usize> = (0..store.len()).collect();
        order.shuffle(rng);
        Self::with_indices(store, order, batch_size)
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}

impl Iterator for BatchLoader<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let chunk = &self.order[self.cursor..end];
        self.cursor = end;

        let items: Result<Vec<_>> = chunk.iter().map(|&i| self.store.get(i)).collect();
        Some(items.and_then(|items| collate(&items)))
    }
}

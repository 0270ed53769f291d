use ndarray::{Array4, ArrayD};
use rand::{Rng, seq::SliceRandom};

use super::Dataset;
use crate::{MlErr, Result};

/// A batch of images with their labels, owned so it can be fed straight into a model.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array4<f32>,
    pub labels: Vec<u8>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The images as the dynamic dimensional input a model takes.
    pub fn inputs(&self) -> ArrayD<f32> {
        self.images.clone().into_dyn()
    }
}

/// Splits a dataset into batches of a fixed size, the last one being shorter if the dataset's
/// length is not a multiple of it.
#[derive(Debug, Clone, Copy)]
pub struct Batcher<'d> {
    dataset: &'d Dataset,
    batch_size: usize,
}

impl<'d> Batcher<'d> {
    /// Creates a new `Batcher`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to split.
    /// * `batch_size` - The amount of samples per batch, must be greater than zero.
    pub fn new(dataset: &'d Dataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(MlErr::InvalidConfig("the batch size must be greater than zero".into()));
        }

        Ok(Self {
            dataset,
            batch_size,
        })
    }

    /// The amount of batches a pass over the dataset yields.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A pass over the dataset in a fresh random order.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'d> {
        let mut order: Vec<_> = (0..self.dataset.len()).collect();
        order.shuffle(rng);

        self.batches(order)
    }

    /// A pass over the dataset in its own order.
    pub fn sequential(&self) -> Batches<'d> {
        self.batches((0..self.dataset.len()).collect())
    }

    fn batches(&self, order: Vec<usize>) -> Batches<'d> {
        Batches {
            dataset: self.dataset,
            batch_size: self.batch_size,
            order,
            cursor: 0,
        }
    }
}

/// A lazy pass over a dataset, batches are gathered as they are requested.
#[derive(Debug, Clone)]
pub struct Batches<'d> {
    dataset: &'d Dataset,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.dataset.gather(&self.order[self.cursor..end]);
        self.cursor = end;

        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches<'_> {}

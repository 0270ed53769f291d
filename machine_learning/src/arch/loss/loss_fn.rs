use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A loss function over a batch of class scores and their expected labels.
pub trait LossFn {
    /// The loss averaged over the batch.
    fn loss(&self, scores: ArrayView2<f32>, labels: &[u8]) -> Result<f32>;

    /// The derivative of `loss` w.r.t. every score.
    fn loss_prime(&self, scores: ArrayView2<f32>, labels: &[u8]) -> Result<Array2<f32>>;
}

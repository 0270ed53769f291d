use ndarray::{Array2, ArrayD};

use crate::{Device, ExecutionContext, Result, optimization::Optimizer};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `x` - A batch of inputs, the first axis being the batch one.
    /// * `ctx` - The execution context, its mode decides whether the pass is cached for a
    ///   following `backward`.
    ///
    /// # Returns
    /// The `(batch, classes)` scores or an error if occurred.
    fn forward(&mut self, x: ArrayD<f32>, ctx: &mut ExecutionContext) -> Result<Array2<f32>>;

    /// Propagates the derivative of the loss w.r.t. the scores of the last training forward
    /// pass, writing the gradient of every parameter onto the gradient buffer.
    ///
    /// # Arguments
    /// * `d` - The derivative of the loss w.r.t. the scores.
    /// * `device` - Where the per sample work runs.
    fn backward(&mut self, d: Array2<f32>, device: &Device) -> Result<()>;

    /// Zeros out the gradient buffer.
    fn zero_grad(&mut self);

    fn params(&self) -> &[f32];

    fn grad(&self) -> &[f32];

    /// Applies the current gradient onto the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()>;
}

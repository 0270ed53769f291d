use crate::{MlErr, Result};

/// An optimization algorithm, applies a gradient onto a set of parameters.
pub trait Optimizer {
    /// Makes one step of the algorithm.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient of the loss w.r.t. `params`.
    ///
    /// # Returns
    /// An error if `params` and `grad` differ in length, in which case nothing is modified.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;

    /// The amount of steps taken so far.
    fn steps(&self) -> usize;
}

pub(super) fn check_lengths(params: &[f32], grad: &[f32]) -> Result<()> {
    if params.len() != grad.len() {
        return Err(MlErr::SizeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        (**self).update_params(params, grad)
    }

    fn steps(&self) -> usize {
        (**self).steps()
    }
}

mod conv;
mod dense;
mod dropout;
mod flatten;
mod layer;
mod pool;
mod relu;

pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use layer::Layer;
pub use pool::MaxPool2d;
pub use relu::ReLU;

use ndarray::prelude::*;
use ndarray_rand::{RandomExt, rand_distr::Uniform};

use crate::{ExecutionContext, MlErr, Result};

/// Converts a dynamic dimensional array into one of a fixed rank.
fn into_rank<D: Dimension>(x: ArrayD<f32>, what: &'static str) -> Result<Array<f32, D>> {
    let got = x.shape().to_vec();

    x.into_dimensionality::<D>()
        .map_err(|_| MlErr::ShapeMismatch {
            what,
            got,
            expected: format!("rank {}", D::NDIM.unwrap_or_default()),
        })
}

/// Gives a view of the raw parameter slice as the weights and biases of a layer.
///
/// # Arguments
/// * `params` - A slice of parameters.
/// * `w_dim` - The shape of the weights matrix.
/// * `b_len` - The amount of biases.
///
/// # Returns
/// A tuple containing the weights and biases.
fn view_params(
    params: &[f32],
    w_dim: (usize, usize),
    b_len: usize,
) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
    let w_size = w_dim.0 * w_dim.1;
    check_len("layer params", params.len(), w_size + b_len)?;

    let (w_raw, b_raw) = params.split_at(w_size);
    let weights = ArrayView2::from_shape(w_dim, w_raw).map_err(|_| MlErr::SizeMismatch {
        what: "layer weights",
        got: w_raw.len(),
        expected: w_size,
    })?;

    Ok((weights, ArrayView1::from(b_raw)))
}

/// Gives a view of the raw gradient slice as the delta weights and delta biases of a layer.
fn view_grad(
    grad: &mut [f32],
    w_dim: (usize, usize),
    b_len: usize,
) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
    let w_size = w_dim.0 * w_dim.1;
    check_len("layer grad", grad.len(), w_size + b_len)?;

    let (dw_raw, db_raw) = grad.split_at_mut(w_size);
    let dw = ArrayViewMut2::from_shape(w_dim, dw_raw).map_err(|_| MlErr::SizeMismatch {
        what: "layer grad weights",
        got: w_size,
        expected: w_size,
    })?;

    Ok((dw, ArrayViewMut1::from(db_raw)))
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

/// Samples every parameter from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
fn init_uniform(params: &mut [f32], fan_in: usize, ctx: &mut ExecutionContext) -> Result<()> {
    let bound = 1. / (fan_in.max(1) as f32).sqrt();
    let distribution = Uniform::new_inclusive(-bound, bound)
        .map_err(|e| MlErr::InvalidConfig(format!("weight initialization: {e}")))?;

    let values = Array1::random_using(params.len(), distribution, ctx.rng());
    ArrayViewMut1::from(params).assign(&values);

    Ok(())
}

use ndarray::ArrayD;
use ndarray_rand::{RandomExt, rand_distr::Bernoulli};

use crate::{ExecutionContext, MlErr, Result};

/// Inverted dropout: while training every activation is zeroed with probability `p` and the
/// survivors are scaled by `1 / (1 - p)`. Outside training it's the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    keep: Bernoulli,

    // Forward metadata, the scaled keep mask
    mask: Option<ArrayD<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Arguments
    /// * `p` - The probability of zeroing an activation, in `[0, 1)`.
    ///
    /// # Returns
    /// An error if `p` is out of range.
    pub fn new(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(MlErr::InvalidConfig(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }

        let keep = Bernoulli::new(1. - p as f64)
            .map_err(|e| MlErr::InvalidConfig(format!("dropout probability {p}: {e}")))?;

        Ok(Self {
            p,
            keep,
            mask: None,
        })
    }

    pub fn forward(&mut self, x: ArrayD<f32>, ctx: &mut ExecutionContext) -> ArrayD<f32> {
        if !ctx.mode().is_train() || self.p == 0. {
            self.mask = None;
            return x;
        }

        let scale = 1. / (1. - self.p);
        let mask = ArrayD::random_using(x.raw_dim(), self.keep, ctx.rng())
            .mapv(|keep: bool| if keep { scale } else { 0. });

        let y = x * &mask;
        self.mask = Some(mask);
        y
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(mask) = self.mask.take() else {
            return Ok(d);
        };

        if mask.shape() != d.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "dropout delta",
                got: d.shape().to_vec(),
                expected: format!("{:?}", mask.shape()),
            });
        }

        Ok(d * &mask)
    }
}

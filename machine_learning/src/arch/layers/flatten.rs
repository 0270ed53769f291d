use ndarray::{ArrayD, IxDyn};

use crate::{ExecutionContext, MlErr, Result};

/// Collapses every dimension but the first (the batch) into one.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    // Forward metadata
    in_shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, ctx: &ExecutionContext) -> Result<ArrayD<f32>> {
        let shape = x.shape().to_vec();
        if shape.is_empty() {
            return Err(MlErr::ShapeMismatch {
                what: "flatten input",
                got: shape,
                expected: "at least one dimension".into(),
            });
        }

        let batch = shape[0];
        let width = shape[1..].iter().product();
        let y = x
            .to_shape(IxDyn(&[batch, width]))
            .map_err(|_| MlErr::SizeMismatch {
                what: "flatten input",
                got: x.len(),
                expected: batch * width,
            })?
            .into_owned();

        self.in_shape = ctx.mode().is_train().then_some(shape);

        Ok(y)
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = self.in_shape.take().ok_or(MlErr::NoForwardCache("flatten"))?;

        let dx = d
            .to_shape(IxDyn(&shape))
            .map_err(|_| MlErr::ShapeMismatch {
                what: "flatten delta",
                got: d.shape().to_vec(),
                expected: format!("{shape:?}"),
            })?
            .into_owned();

        Ok(dx)
    }
}

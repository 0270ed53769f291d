use ndarray::ArrayD;

use crate::{ExecutionContext, MlErr, Result};

/// Rectified linear unit, negative values are clamped to zero.
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    // Forward metadata
    a: Option<ArrayD<f32>>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, mut x: ArrayD<f32>, ctx: &ExecutionContext) -> ArrayD<f32> {
        // NaNs go through untouched so the trainer can notice them
        x.mapv_inplace(|z| if z < 0. { 0. } else { z });

        self.a = ctx.mode().is_train().then(|| x.clone());

        x
    }

    pub fn backward(&mut self, mut d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let a = self.a.take().ok_or(MlErr::NoForwardCache("relu"))?;

        if a.shape() != d.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "relu delta",
                got: d.shape().to_vec(),
                expected: format!("{:?}", a.shape()),
            });
        }

        d.zip_mut_with(&a, |d, &a| {
            if a <= 0. {
                *d = 0.;
            }
        });

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::Mode;

    #[test]
    fn clamps_negatives_and_masks_the_delta() {
        let mut ctx = ExecutionContext::seeded(0);
        ctx.set_mode(Mode::Train);
        let mut relu = ReLU::new();

        let y = relu.forward(array![[-1f32, 0., 2.]].into_dyn(), &ctx);
        assert_eq!(y, array![[0f32, 0., 2.]].into_dyn());

        let d = relu.backward(array![[5f32, 5., 5.]].into_dyn()).unwrap();
        assert_eq!(d, array![[0f32, 0., 5.]].into_dyn());
    }

    #[test]
    fn nan_is_not_hidden() {
        let mut relu = ReLU::new();
        let y = relu.forward(array![f32::NAN].into_dyn(), &ExecutionContext::seeded(0));

        assert!(y.iter().all(|v| v.is_nan()));
    }
}

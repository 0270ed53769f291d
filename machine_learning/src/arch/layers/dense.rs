use ndarray::{linalg, prelude::*};

use super::{init_uniform, into_rank, view_grad, view_params};
use crate::{ExecutionContext, MlErr, Result};

/// A fully connected (affine) layer, `y = x·W + b`.
///
/// The parameter slice holds the weights, row major with shape `(in, out)`, followed by the
/// `out` biases.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths of the layer.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            x: None,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The shapes of the weights and the biases, in the order they are laid out.
    pub fn param_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        vec![
            ("weight", vec![self.dim.0, self.dim.1]),
            ("bias", vec![self.dim.1]),
        ]
    }

    /// Fills the given parameters with `U(-1/sqrt(in), 1/sqrt(in))`.
    pub fn init(&self, params: &mut [f32], ctx: &mut ExecutionContext) -> Result<()> {
        init_uniform(params, self.dim.0, ctx)
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayD<f32>,
        ctx: &ExecutionContext,
    ) -> Result<ArrayD<f32>> {
        let x: Array2<f32> = into_rank(x, "dense input")?;
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "dense input",
                got: x.shape().to_vec(),
                expected: format!("[_, {}]", self.dim.0),
            });
        }

        let (w, b) = view_params(params, self.dim, self.dim.1)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        self.x = ctx.mode().is_train().then_some(x);

        Ok(z.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let d: Array2<f32> = into_rank(d, "dense delta")?;
        let x = self.x.take().ok_or(MlErr::NoForwardCache("dense"))?;

        let (mut dw, mut db) = view_grad(grad, self.dim, self.dim.1)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = view_params(params, self.dim, self.dim.1)?;
        let mut dx = Array2::zeros((d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut dx);

        Ok(dx.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::Mode;

    fn train_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::seeded(7);
        ctx.set_mode(Mode::Train);
        ctx
    }

    #[test]
    fn forward_is_affine() {
        let mut dense = Dense::new((2, 3));
        // w = [[1, 2, 3], [4, 5, 6]], b = [1, 1, 1]
        let params = [1., 2., 3., 4., 5., 6., 1., 1., 1.];
        let x = array![[1., 1.], [0., 2.]].into_dyn();

        let y = dense.forward(&params, x, &train_ctx()).unwrap();

        assert_eq!(y, array![[6f32, 8., 10.], [9., 11., 13.]].into_dyn());
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut ctx = train_ctx();
        let mut dense = Dense::new((3, 2));
        let mut params = vec![0.; dense.size()];
        dense.init(&mut params, &mut ctx).unwrap();

        let x = array![[0.5, -1.0, 2.0], [1.5, 0.25, -0.75]];
        // loss = sum(y), so the delta is all ones
        let loss = |params: &[f32], dense: &mut Dense| {
            dense
                .forward(params, x.clone().into_dyn(), &ExecutionContext::seeded(0))
                .unwrap()
                .sum()
        };

        dense.forward(&params, x.clone().into_dyn(), &ctx).unwrap();
        let mut grad = vec![0.; dense.size()];
        dense
            .backward(&params, &mut grad, Array2::ones((2, 2)).into_dyn())
            .unwrap();

        let eps = 1e-2;
        for i in 0..params.len() {
            let mut plus = params.clone();
            plus[i] += eps;
            let mut minus = params.clone();
            minus[i] -= eps;

            let numeric = (loss(&plus, &mut dense) - loss(&minus, &mut dense)) / (2. * eps);
            assert!((numeric - grad[i]).abs() < 1e-2, "param {i}: {numeric} vs {}", grad[i]);
        }
    }

    #[test]
    fn wrong_input_width_is_a_shape_mismatch() {
        let mut dense = Dense::new((4, 2));
        let params = vec![0.; dense.size()];
        let x = Array2::<f32>::zeros((3, 5)).into_dyn();

        let err = dense.forward(&params, x, &train_ctx()).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }

    #[test]
    fn eval_forward_keeps_no_metadata() {
        let mut dense = Dense::new((2, 2));
        let params = vec![0.; dense.size()];
        let x = Array2::<f32>::ones((1, 2)).into_dyn();

        dense.forward(&params, x, &ExecutionContext::seeded(0)).unwrap();
        let mut grad = vec![0.; dense.size()];
        let err = dense
            .backward(&params, &mut grad, Array2::ones((1, 2)).into_dyn())
            .unwrap_err();

        assert!(matches!(err, MlErr::NoForwardCache(_)));
    }
}

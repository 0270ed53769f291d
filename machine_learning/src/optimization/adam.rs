use super::{Optimizer, optimizer::check_lengths};
use crate::Result;

pub const LEARNING_RATE: f32 = 0.001;
pub const BETA1: f32 = 0.9;
pub const BETA2: f32 = 0.999;
pub const EPSILON: f32 = 1e-8;

/// Adam optimization algorithm, with bias corrected moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,

    // beta1^t and beta2^t
    beta1_t: f32,
    beta2_t: f32,
    t: usize,
    m: Box<[f32]>,
    v: Box<[f32]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            beta1_t: 1.,
            beta2_t: 1.,
            t: 0,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
        }
    }

    /// Creates a new `Adam` with the usual hyperparameters, a learning rate of `0.001`, betas of
    /// `0.9` and `0.999` and an epsilon of `1e-8`.
    pub fn with_defaults(len: usize) -> Self {
        Self::new(len, LEARNING_RATE, BETA1, BETA2, EPSILON)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_lengths(params, grad)?;
        check_lengths(params, &self.m)?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.t += 1;
        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, &g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g * g;

                let m_hat = *m / bc1;
                let v_hat = *v / bc2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });

        Ok(())
    }

    fn steps(&self) -> usize {
        self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MlErr;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        let mut adam = Adam::with_defaults(3);
        let mut params = [1f32, 1., 1.];

        adam.update_params(&mut params, &[0.5, 0., -3.]).unwrap();

        // With bias correction the first step is lr * g / (|g| + eps)
        assert!((params[0] - (1. - LEARNING_RATE)).abs() < 1e-6);
        assert_eq!(params[1], 1.);
        assert!((params[2] - (1. + LEARNING_RATE)).abs() < 1e-6);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn moments_accumulate_across_steps() {
        let mut adam = Adam::new(1, 0.1, 0.9, 0.999, 1e-8);
        let mut params = [0f32];

        adam.update_params(&mut params, &[1.]).unwrap();
        adam.update_params(&mut params, &[-1.]).unwrap();

        // m = 0.9 * 0.1 - 0.1 = -0.01, m_hat = -0.01 / 0.19
        // v = 0.999 * 0.001 + 0.001 = 0.001999, v_hat = 0.001999 / 0.001999 = 1
        let expected = -0.1 + 0.1 * (0.01 / 0.19);
        assert!((params[0] - expected).abs() < 1e-5, "{}", params[0]);
        assert_eq!(adam.steps(), 2);
    }

    #[test]
    fn length_mismatch_leaves_everything_untouched() {
        let mut adam = Adam::with_defaults(2);
        let mut params = [1f32, 2.];

        let err = adam.update_params(&mut params, &[1.]).unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { .. }));
        assert_eq!(params, [1., 2.]);
        assert_eq!(adam.steps(), 0);
    }
}

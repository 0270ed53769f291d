use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax followed by the negative log likelihood of the expected class.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

fn check(scores: ArrayView2<f32>, labels: &[u8]) -> Result<()> {
    let (batch, classes) = scores.dim();

    if batch != labels.len() || batch == 0 {
        return Err(MlErr::ShapeMismatch {
            what: "scores",
            got: scores.shape().to_vec(),
            expected: format!("[{}, _]", labels.len()),
        });
    }

    if let Some(&label) = labels.iter().find(|&&label| label as usize >= classes) {
        return Err(MlErr::LabelOutOfRange {
            label: label as usize,
            classes,
        });
    }

    Ok(())
}

/// `log(sum(exp(row)))`, shifted by the maximum so that nothing overflows.
fn log_sum_exp(row: ArrayView1<f32>) -> f32 {
    let max = row.fold(f32::NEG_INFINITY, |acc, &s| acc.max(s));
    max + row.mapv(|s| (s - max).exp()).sum().ln()
}

impl LossFn for CrossEntropy {
    fn loss(&self, scores: ArrayView2<f32>, labels: &[u8]) -> Result<f32> {
        check(scores, labels)?;

        let total: f32 = scores
            .outer_iter()
            .zip(labels)
            .map(|(row, &label)| log_sum_exp(row) - row[label as usize])
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, scores: ArrayView2<f32>, labels: &[u8]) -> Result<Array2<f32>> {
        check(scores, labels)?;

        let batch = labels.len() as f32;
        let mut d = scores.to_owned();

        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(labels) {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|s| (s - lse).exp());
            row[label as usize] -= 1.;
            row /= batch;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_scores_give_log_of_the_classes() {
        let scores = Array2::<f32>::zeros((4, 10));
        let loss = CrossEntropy.loss(scores.view(), &[0, 3, 9, 5]).unwrap();

        assert!((loss - 10f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn loss_is_positive_and_stable_for_large_scores() {
        let scores = array![[1000f32, 0., -1000.], [2., 1., 0.5]];
        let loss = CrossEntropy.loss(scores.view(), &[1, 0]).unwrap();

        assert!(loss.is_finite());
        assert!(loss > 0.);
    }

    #[test]
    fn derivative_is_softmax_minus_onehot_over_the_batch() {
        let scores = array![[0f32, 0.], [0., 0.]];
        let d = CrossEntropy.loss_prime(scores.view(), &[0, 1]).unwrap();

        assert_eq!(d, array![[-0.25f32, 0.25], [0.25, -0.25]]);
    }

    #[test]
    fn derivative_matches_finite_differences() {
        let scores = array![[0.3f32, -1.2, 2.0], [0.7, 0.1, -0.4]];
        let labels = [2, 1];
        let d = CrossEntropy.loss_prime(scores.view(), &labels).unwrap();

        let eps = 1e-2;
        for ((i, j), &analytic) in d.indexed_iter() {
            let mut plus = scores.clone();
            plus[[i, j]] += eps;
            let mut minus = scores.clone();
            minus[[i, j]] -= eps;

            let numeric = (CrossEntropy.loss(plus.view(), &labels).unwrap()
                - CrossEntropy.loss(minus.view(), &labels).unwrap())
                / (2. * eps);

            assert!((numeric - analytic).abs() < 1e-3, "{numeric} vs {analytic}");
        }
    }

    #[test]
    fn label_out_of_range() {
        let scores = Array2::<f32>::zeros((1, 10));
        let err = CrossEntropy.loss(scores.view(), &[10]).unwrap_err();

        assert!(matches!(err, MlErr::LabelOutOfRange { label: 10, classes: 10 }));
    }

    #[test]
    fn label_count_mismatch() {
        let scores = Array2::<f32>::zeros((2, 10));
        let err = CrossEntropy.loss_prime(scores.view(), &[1]).unwrap_err();

        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }
}

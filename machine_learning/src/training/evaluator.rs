use log::info;
use ndarray::{ArrayD, ArrayView2};

use crate::{
    ExecutionContext, Mode, Result,
    arch::Model,
    dataset::{Batcher, Dataset},
};

/// The outcome of an evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
    /// `correct / total`, always in `[0, 1]`.
    pub accuracy: f64,
    /// The predicted label of every sample, in the dataset's order.
    pub predictions: Vec<u8>,
}

/// The index of the highest score of each row, the first one on ties.
pub fn argmax(scores: ArrayView2<f32>) -> Vec<u8> {
    scores
        .outer_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &s) in row.iter().enumerate() {
                if s > row[best] {
                    best = i;
                }
            }

            best as u8
        })
        .collect()
}

/// Makes a single pass over `dataset` in inference mode, counting the correct predictions.
///
/// # Arguments
/// * `model` - The model to evaluate, its parameters are left untouched.
/// * `dataset` - The evaluation samples, visited in order.
/// * `batch_size` - The amount of samples per forward pass.
/// * `ctx` - The execution context, left in evaluation mode.
pub fn evaluate<M: Model>(
    model: &mut M,
    dataset: &Dataset,
    batch_size: usize,
    ctx: &mut ExecutionContext,
) -> Result<Evaluation> {
    ctx.set_mode(Mode::Eval);

    let batcher = Batcher::new(dataset, batch_size)?;
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut correct = 0;

    for batch in batcher.sequential() {
        let scores = model.forward(batch.inputs(), ctx)?;
        let predicted = argmax(scores.view());

        correct += predicted
            .iter()
            .zip(&batch.labels)
            .filter(|(p, l)| p == l)
            .count();
        predictions.extend(predicted);
    }

    let total = predictions.len();
    let accuracy = correct as f64 / total as f64;
    info!("evaluated {total} samples, {correct} correct ({accuracy:.4})");

    Ok(Evaluation {
        correct,
        total,
        accuracy,
        predictions,
    })
}

/// Predicts the label of every image in inference mode.
///
/// # Arguments
/// * `model` - The model that scores the images.
/// * `images` - A batch of images shaped as the model's input.
/// * `ctx` - The execution context, left in evaluation mode.
pub fn predict<M: Model>(
    model: &mut M,
    images: ArrayD<f32>,
    ctx: &mut ExecutionContext,
) -> Result<Vec<u8>> {
    ctx.set_mode(Mode::Eval);

    let scores = model.forward(images, ctx)?;
    Ok(argmax(scores.view()))
}

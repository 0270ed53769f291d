use log::{debug, info};

use crate::{
    ExecutionContext, MlErr, Mode, Result,
    arch::{Model, loss::LossFn},
    dataset::{Batch, Batcher, Dataset},
    optimization::Optimizer,
};

/// What a training epoch went through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// The epoch number, starting at 1.
    pub epoch: usize,
    pub batches: usize,
    pub samples: usize,
    /// The loss averaged over the epoch's batches.
    pub mean_loss: f32,
}

/// A model `Trainer`. Contains the components needed for training a model other than the model
/// itself and its data.
#[derive(Debug)]
pub struct Trainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    optimizer: O,
    loss_fn: L,
    epochs: usize,
    batch_size: usize,
}

impl<O, L> Trainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `optimizer` - Dictates how to update the parameters after each batch.
    /// * `loss_fn` - Measures the difference between the model's scores and the labels.
    /// * `epochs` - The amount of passes over the dataset per `train` call.
    /// * `batch_size` - The amount of samples per parameter update.
    ///
    /// # Returns
    /// An error if either `epochs` or `batch_size` is zero.
    pub fn new(optimizer: O, loss_fn: L, epochs: usize, batch_size: usize) -> Result<Self> {
        if epochs == 0 {
            return Err(MlErr::InvalidConfig("at least one epoch is needed".into()));
        }

        if batch_size == 0 {
            return Err(MlErr::InvalidConfig("the batch size must be greater than zero".into()));
        }

        Ok(Self {
            optimizer,
            loss_fn,
            epochs,
            batch_size,
        })
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Trains `model` for every epoch, stopping at the first error.
    ///
    /// # Arguments
    /// * `model` - The model whose parameters get trained.
    /// * `dataset` - The training samples, shuffled anew on every epoch.
    /// * `ctx` - The execution context, left in training mode.
    /// * `on_epoch` - Called with the stats of every finished epoch.
    ///
    /// # Returns
    /// The stats of every epoch.
    pub fn train<M, F>(
        &mut self,
        model: &mut M,
        dataset: &Dataset,
        ctx: &mut ExecutionContext,
        mut on_epoch: F,
    ) -> Result<Vec<EpochStats>>
    where
        M: Model,
        F: FnMut(&EpochStats),
    {
        let batcher = Batcher::new(dataset, self.batch_size)?;
        let mut history = Vec::with_capacity(self.epochs);

        for epoch in 1..=self.epochs {
            ctx.set_mode(Mode::Train);

            let mut total_loss = 0.0;
            let mut samples = 0;
            let mut batches = 0;

            for (i, batch) in batcher.shuffled(ctx.rng()).enumerate() {
                let loss = self.step(model, &batch, ctx, (epoch, i + 1))?;
                debug!("epoch {epoch}, batch {}: loss {loss:.6}", i + 1);

                total_loss += loss;
                samples += batch.len();
                batches += 1;
            }

            let stats = EpochStats {
                epoch,
                batches,
                samples,
                mean_loss: total_loss / batches as f32,
            };

            info!(
                "epoch {epoch}: {batches} batches, {samples} samples, mean loss {:.6}",
                stats.mean_loss
            );

            on_epoch(&stats);
            history.push(stats);
        }

        Ok(history)
    }

    /// Makes a single parameter update out of a batch.
    ///
    /// # Returns
    /// The batch's loss.
    fn step<M: Model>(
        &mut self,
        model: &mut M,
        batch: &Batch,
        ctx: &mut ExecutionContext,
        (epoch, index): (usize, usize),
    ) -> Result<f32> {
        model.zero_grad();

        let scores = model.forward(batch.inputs(), ctx)?;
        let loss = self.loss_fn.loss(scores.view(), &batch.labels)?;
        if !loss.is_finite() {
            return Err(MlErr::NumericInstability {
                what: "loss",
                epoch,
                batch: index,
            });
        }

        let d = self.loss_fn.loss_prime(scores.view(), &batch.labels)?;
        model.backward(d, ctx.device())?;

        if model.grad().iter().any(|g| !g.is_finite()) {
            return Err(MlErr::NumericInstability {
                what: "gradient",
                epoch,
                batch: index,
            });
        }

        model.optimize(&mut self.optimizer)?;
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;
    use crate::{
        arch::{Sequential, layers::Layer, loss::CrossEntropy},
        optimization::{Adam, GradientDescent},
    };

    fn linear(ctx: &mut ExecutionContext) -> Sequential {
        let layers = [Layer::flatten(), Layer::dense((4, 2))];
        Sequential::new(layers, [1, 2, 2], ctx).unwrap()
    }

    /// Two separable classes, bright top row or bright bottom row.
    fn two_rows(len: usize) -> Dataset {
        let images = Array4::from_shape_fn((len, 1, 2, 2), |(i, _, row, _)| {
            if row == i % 2 { 1. } else { 0. }
        });
        let labels = (0..len).map(|i| (i % 2) as u8).collect();

        Dataset::new(images, labels).unwrap()
    }

    #[test]
    fn loss_goes_down() {
        let mut ctx = ExecutionContext::seeded(9);
        let mut model = linear(&mut ctx);
        let mut trainer = Trainer::new(GradientDescent::new(0.5), CrossEntropy, 20, 4).unwrap();

        let history = trainer.train(&mut model, &two_rows(16), &mut ctx, |_| {}).unwrap();

        assert_eq!(history.len(), 20);
        assert!(history[19].mean_loss < history[0].mean_loss / 2.);
        assert_eq!(trainer.optimizer().steps(), 20 * 4);
    }

    #[test]
    fn every_epoch_is_reported() {
        let mut ctx = ExecutionContext::seeded(0);
        let mut model = linear(&mut ctx);
        let mut trainer = Trainer::new(Adam::with_defaults(model.size()), CrossEntropy, 3, 5).unwrap();

        let mut reported = Vec::new();
        trainer
            .train(&mut model, &two_rows(12), &mut ctx, |stats| reported.push(*stats))
            .unwrap();

        let epochs: Vec<_> = reported.iter().map(|s| s.epoch).collect();
        assert_eq!(epochs, [1, 2, 3]);
        assert!(reported.iter().all(|s| s.batches == 3 && s.samples == 12));
        assert_eq!(ctx.mode(), Mode::Train);
    }

    #[test]
    fn non_finite_loss_halts_before_the_update() {
        let mut ctx = ExecutionContext::seeded(0);
        let mut model = linear(&mut ctx);
        let before = model.params().to_vec();

        let mut images = Array4::zeros((4, 1, 2, 2));
        images[[2, 0, 1, 1]] = f32::NAN;
        let dataset = Dataset::new(images, vec![0, 1, 0, 1]).unwrap();

        let mut trainer = Trainer::new(GradientDescent::new(0.1), CrossEntropy, 1, 4).unwrap();
        let err = trainer.train(&mut model, &dataset, &mut ctx, |_| {}).unwrap_err();

        assert!(matches!(
            err,
            MlErr::NumericInstability { what: "loss", epoch: 1, batch: 1 }
        ));
        assert_eq!(model.params(), &before[..]);
        assert_eq!(trainer.optimizer().steps(), 0);
    }

    #[test]
    fn label_out_of_range_aborts() {
        let mut ctx = ExecutionContext::seeded(0);
        let mut model = linear(&mut ctx);
        let dataset = Dataset::new(Array4::zeros((2, 1, 2, 2)), vec![0, 2]).unwrap();

        let mut trainer = Trainer::new(GradientDescent::new(0.1), CrossEntropy, 1, 2).unwrap();
        let err = trainer.train(&mut model, &dataset, &mut ctx, |_| {}).unwrap_err();

        assert!(matches!(err, MlErr::LabelOutOfRange { label: 2, classes: 2 }));
    }

    #[test]
    fn zero_epochs_or_batch_size_are_rejected() {
        assert!(Trainer::new(GradientDescent::new(0.1), CrossEntropy, 0, 1).is_err());
        assert!(Trainer::new(GradientDescent::new(0.1), CrossEntropy, 1, 0).is_err());
    }
}

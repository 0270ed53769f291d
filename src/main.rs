mod cli;
mod config;
mod display;

use std::{env, process};

use anyhow::Context;
use log::info;
use machine_learning::{
    arch::{loss::CrossEntropy, Model},
    dataset::{read_bitmap, Dataset, MnistSource},
    training::{evaluate, predict, Trainer},
    Device, ExecutionContext,
};
use ndarray::Axis;

use cli::{Args, USAGE};
use config::PipelineConfig;
use display::{ConsoleView, PredictionView, StripView, MAX_PAIRS};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let args = match Args::parse(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = args.data {
        config.data_dir = dir;
    }

    let kind = args.kind;
    let normalization = config.normalization_for(kind);

    let device = Device::with_fallback(config.threads);
    info!("running on {} thread(s)", device.threads());
    let mut ctx = ExecutionContext::new(device, config.seed);

    let source = MnistSource::new(&config.data_dir, normalization)
        .with_lengths(config.train_len, config.eval_len)?;
    let training = source
        .training_samples()
        .context("cannot load the training samples")?;
    let evaluation = source
        .evaluation_samples()
        .context("cannot load the evaluation samples")?;

    let mut model = kind.build(&mut ctx)?;
    let optimizer = config.optimizer.build(model.size());
    let mut trainer = Trainer::new(optimizer, CrossEntropy, config.epochs, config.batch_size)?;

    trainer.train(&mut model, training, &mut ctx, |stats| {
        println!("Epoch {} complete", stats.epoch);
    })?;

    let result = evaluate(&mut model, evaluation, config.eval_batch_size, &mut ctx)?;
    println!("Test accuracy: {:.4}", result.accuracy);

    match &args.show {
        Some(path) => show_predictions(&mut StripView::new(path), evaluation, &result.predictions)?,
        None => show_predictions(&mut ConsoleView::stdout(), evaluation, &result.predictions)?,
    }

    for path in &args.bitmaps {
        let x = read_bitmap(path, normalization)
            .with_context(|| format!("cannot classify '{}'", path.display()))?;
        let labels = predict(&mut model, x.into_dyn(), &mut ctx)?;

        if let Some(label) = labels.first() {
            println!("The number is {label}");
        }
    }

    Ok(())
}

/// Hands the first evaluation images, along with their predictions, to a view.
fn show_predictions<V: PredictionView>(
    view: &mut V,
    dataset: &Dataset,
    predictions: &[u8],
) -> anyhow::Result<()> {
    let pairs: Vec<_> = predictions
        .iter()
        .take(MAX_PAIRS)
        .enumerate()
        .map(|(i, &label)| {
            let (image, _) = dataset.sample(i);
            (image.index_axis_move(Axis(0), 0), label)
        })
        .collect();

    view.show(&pairs)
}

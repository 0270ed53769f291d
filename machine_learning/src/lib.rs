//! Training and inference pipelines for handwritten digit classifiers.
//!
//! A [`ModelKind`](arch::ModelKind) builds a [`Sequential`](arch::Sequential) of explicit
//! forward/backward layers, a [`Trainer`](training::Trainer) fits it on batches drawn from a
//! [`Dataset`](dataset::Dataset) and [`evaluate`](training::evaluate) scores it. Every pass
//! takes an [`ExecutionContext`] holding the device, the rng and the mode.

pub mod arch;
mod context;
pub mod dataset;
pub mod error;
pub mod optimization;
pub mod training;

pub use context::{Device, ExecutionContext, Mode};
pub use error::{MlErr, Result};

mod evaluator;
mod trainer;

pub use evaluator::{Evaluation, argmax, evaluate, predict};
pub use trainer::{EpochStats, Trainer};

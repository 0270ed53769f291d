use std::{fs, path::Path, path::PathBuf};

use anyhow::Context;
use machine_learning::{
    arch::ModelKind,
    dataset::{Normalization, EVAL_LEN, TRAIN_LEN},
    optimization::{Adam, GradientDescent, Optimizer},
    MlErr,
};
use serde::Deserialize;

fn default_learning_rate() -> f32 {
    0.001
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

/// The configuration of the optimizer, every missing hyperparameter takes its usual value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        #[serde(default = "default_learning_rate")]
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            learning_rate: default_learning_rate(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }
}

impl OptimizerConfig {
    /// Builds the optimizer for a model of `len` parameters.
    pub fn build(self, len: usize) -> Box<dyn Optimizer> {
        match self {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
            OptimizerConfig::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
        }
    }

    fn validate(&self) -> Result<(), MlErr> {
        let (learning_rate, betas, epsilon) = match *self {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => (learning_rate, [beta1, beta2], epsilon),
            OptimizerConfig::GradientDescent { learning_rate } => (learning_rate, [0., 0.], 1.),
        };

        if !(learning_rate > 0. && learning_rate.is_finite()) {
            return Err(MlErr::InvalidConfig(format!(
                "the learning rate must be positive, got {learning_rate}"
            )));
        }

        if betas.iter().any(|b| !(0.0..1.0).contains(b)) || !(epsilon > 0.) {
            return Err(MlErr::InvalidConfig(format!(
                "bad adam hyperparameters, betas {betas:?} and epsilon {epsilon}"
            )));
        }

        Ok(())
    }
}

/// Everything a train and evaluate run can be tuned with. Missing fields take their default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    pub optimizer: OptimizerConfig,
    /// `None` picks the model kind's own preprocessing.
    pub normalization: Option<Normalization>,
    pub train_len: usize,
    pub eval_len: usize,
    pub seed: Option<u64>,
    /// Worker threads of the accelerator pool, `0` runs everything on the calling thread.
    pub threads: usize,
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 32,
            eval_batch_size: 1000,
            optimizer: OptimizerConfig::default(),
            normalization: None,
            train_len: TRAIN_LEN,
            eval_len: EVAL_LEN,
            seed: None,
            threads: 0,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config '{}'", path.display()))?;

        Self::from_json(&content).with_context(|| format!("bad config '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MlErr> {
        if self.epochs == 0 {
            return Err(MlErr::InvalidConfig("epochs must be greater than zero".into()));
        }

        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err(MlErr::InvalidConfig(
                "batch sizes must be greater than zero".into(),
            ));
        }

        self.optimizer.validate()
    }

    pub fn normalization_for(&self, kind: ModelKind) -> Normalization {
        self.normalization
            .unwrap_or_else(|| kind.default_normalization())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_takes_every_default() {
        let config = PipelineConfig::from_json("{}").unwrap();

        assert_eq!(config, PipelineConfig::default());
        assert_eq!((config.epochs, config.batch_size, config.eval_batch_size), (5, 32, 1000));
        assert_eq!(
            config.normalization_for(ModelKind::Cnn),
            Normalization::Standardized
        );
        assert_eq!(config.normalization_for(ModelKind::Mlp), Normalization::Normalized);
    }

    #[test]
    fn partial_optimizer_keeps_the_other_hyperparameters() {
        let json = r#"{
            "epochs": 2,
            "optimizer": { "adam": { "learning_rate": 0.01 } },
            "normalization": "raw",
            "seed": 7
        }"#;

        let config = PipelineConfig::from_json(json).unwrap();

        assert_eq!(config.epochs, 2);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.normalization_for(ModelKind::Cnn), Normalization::Raw);
        assert_eq!(
            config.optimizer,
            OptimizerConfig::Adam {
                learning_rate: 0.01,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            }
        );
    }

    #[test]
    fn gradient_descent_can_be_selected() {
        let json = r#"{ "optimizer": { "gradient_descent": { "learning_rate": 0.1 } } }"#;
        let config = PipelineConfig::from_json(json).unwrap();

        let mut optimizer = config.optimizer.build(1);
        let mut params = [1.];
        optimizer.update_params(&mut params, &[1.]).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-6);
        assert_eq!(optimizer.steps(), 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PipelineConfig::from_json(r#"{ "epochs": 0 }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "batch_size": 0 }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "epohcs": 3 }"#).is_err());
        assert!(
            PipelineConfig::from_json(r#"{ "optimizer": { "adam": { "beta1": 1.0 } } }"#)
                .is_err()
        );
    }
}

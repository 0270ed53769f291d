use std::{fmt, str::FromStr};

use log::info;
use serde::Deserialize;

use super::{Model, Sequential, layers::Layer};
use crate::{
    ExecutionContext, MlErr, Result,
    dataset::{CLASSES, IMAGE_SIDE, Normalization},
};

/// The shape of a single model input, `(channels, height, width)`.
pub const INPUT_SHAPE: [usize; 3] = [1, IMAGE_SIDE, IMAGE_SIDE];

/// The two digit classifiers this crate knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Fully connected: flatten, 784 -> 128, relu, dropout(0.2), 128 -> 10.
    Mlp,
    /// Two same padded 3x3 convolutions with relus, two 2x2 max poolings, dropout(0.25),
    /// flatten, 3136 -> 128, relu, 128 -> 10.
    Cnn,
}

impl ModelKind {
    /// The layers of this kind of model, in forward order.
    pub fn layers(self) -> Result<Vec<Layer>> {
        let pixels = IMAGE_SIDE * IMAGE_SIDE;

        let layers = match self {
            ModelKind::Mlp => vec![
                Layer::flatten(),
                Layer::dense((pixels, 128)),
                Layer::relu(),
                Layer::dropout(0.2)?,
                Layer::dense((128, CLASSES)),
            ],
            ModelKind::Cnn => {
                // both poolings go after the second convolution, 28 -> 14 -> 7
                let pooled = IMAGE_SIDE / 4;

                vec![
                    Layer::conv2d((1, 32), 3),
                    Layer::relu(),
                    Layer::conv2d((32, 64), 3),
                    Layer::relu(),
                    Layer::max_pool(2),
                    Layer::max_pool(2),
                    Layer::dropout(0.25)?,
                    Layer::flatten(),
                    Layer::dense((64 * pooled * pooled, 128)),
                    Layer::relu(),
                    Layer::dense((128, CLASSES)),
                ]
            }
        };

        Ok(layers)
    }

    /// Builds a freshly initialized model of this kind.
    ///
    /// # Arguments
    /// * `ctx` - The execution context, its rng draws the initial parameters.
    pub fn build(self, ctx: &mut ExecutionContext) -> Result<Sequential> {
        let model = Sequential::new(self.layers()?, INPUT_SHAPE, ctx)?;
        info!("built the {self} model with {} parameters", model.size());

        Ok(model)
    }

    /// How the inputs of this kind of model are preprocessed unless told otherwise.
    pub fn default_normalization(self) -> Normalization {
        match self {
            ModelKind::Mlp => Normalization::Normalized,
            ModelKind::Cnn => Normalization::Standardized,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelKind::Mlp => "mlp",
            ModelKind::Cnn => "cnn",
        };

        write!(f, "{s}")
    }
}

impl FromStr for ModelKind {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mlp" => Ok(ModelKind::Mlp),
            "cnn" => Ok(ModelKind::Cnn),
            _ => Err(MlErr::InvalidConfig(format!(
                "unknown model kind `{s}`, expected `mlp` or `cnn`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;

    #[test]
    fn parameter_counts() {
        let mut ctx = ExecutionContext::seeded(0);

        let mlp = ModelKind::Mlp.build(&mut ctx).unwrap();
        assert_eq!(mlp.size(), 785 * 128 + 129 * 10);

        let cnn = ModelKind::Cnn.build(&mut ctx).unwrap();
        let convs = (9 + 1) * 32 + (32 * 9 + 1) * 64;
        assert_eq!(cnn.size(), convs + 3137 * 128 + 129 * 10);
    }

    #[test]
    fn both_kinds_score_ten_classes() {
        let mut ctx = ExecutionContext::seeded(1);

        for kind in [ModelKind::Mlp, ModelKind::Cnn] {
            let mut model = kind.build(&mut ctx).unwrap();

            for batch in [1, 3] {
                let x = Array4::<f32>::zeros((batch, 1, 28, 28)).into_dyn();
                let y = model.forward(x, &mut ctx).unwrap();
                assert_eq!(y.dim(), (batch, CLASSES), "{kind}");
            }
        }
    }

    #[test]
    fn both_poolings_follow_the_second_convolution() {
        let kinds: Vec<_> = ModelKind::Cnn
            .layers()
            .unwrap()
            .iter()
            .map(Layer::kind)
            .collect();

        assert_eq!(
            kinds,
            [
                "conv2d", "relu", "conv2d", "relu", "max_pool", "max_pool", "dropout", "flatten",
                "dense", "relu", "dense"
            ]
        );
    }

    #[test]
    fn names_parse() {
        assert_eq!("cnn".parse::<ModelKind>().unwrap(), ModelKind::Cnn);
        assert_eq!(ModelKind::Mlp.to_string(), "mlp");
        assert!(matches!("rnn".parse::<ModelKind>(), Err(MlErr::InvalidConfig(_))));
    }
}

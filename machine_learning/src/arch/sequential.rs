use log::debug;
use ndarray::{Array2, ArrayD, Ix2};

use super::{Model, ParamManager, layers::Layer};
use crate::{Device, ExecutionContext, MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns one flat buffer of parameters, each layer working on its own contiguous
/// region of it.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
    input_shape: [usize; 3],
    params: ParamManager,
}

impl Sequential {
    /// Creates a new `Sequential` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `input_shape` - The `(channels, height, width)` of a single input.
    /// * `ctx` - The execution context, its rng draws the initial parameters.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I, input_shape: [usize; 3], ctx: &mut ExecutionContext) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<_> = layers.into_iter().collect();
        let mut params = ParamManager::new(layers.iter().map(Layer::size).collect());

        for (layer, region) in layers.iter().zip(params.front_mut()) {
            layer.init(region, ctx)?;
        }

        let kinds: Vec<_> = layers.iter().map(Layer::kind).collect();
        debug!(
            "built a sequential of {} parameters: {}",
            params.size(),
            kinds.join(" -> ")
        );

        Ok(Self {
            layers,
            input_shape,
            params,
        })
    }

    /// Lists every parameter tensor as `("{layer index}.{name}", shape)`, in the order they are
    /// laid out in the parameter buffer.
    pub fn named_params(&self) -> Vec<(String, Vec<usize>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .param_shapes()
                    .into_iter()
                    .map(move |(name, shape)| (format!("{i}.{name}"), shape))
            })
            .collect()
    }

    /// Overwrites every parameter of the model.
    pub fn load_params(&mut self, values: &[f32]) -> Result<()> {
        self.params.load(values)
    }

    fn check_input(&self, x: &ArrayD<f32>) -> Result<()> {
        let shape = x.shape();

        if shape.len() != 4 || shape[0] == 0 || shape[1..] != self.input_shape {
            let [c, h, w] = self.input_shape;
            return Err(MlErr::ShapeMismatch {
                what: "model input",
                got: shape.to_vec(),
                expected: format!("[_, {c}, {h}, {w}]"),
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.size()
    }

    fn forward(&mut self, mut x: ArrayD<f32>, ctx: &mut ExecutionContext) -> Result<Array2<f32>> {
        self.check_input(&x)?;

        for (layer, params) in self.layers.iter_mut().zip(self.params.front()) {
            x = layer.forward(params, x, ctx)?;
        }

        let got = x.shape().to_vec();
        x.into_dimensionality::<Ix2>()
            .map_err(|_| MlErr::ShapeMismatch {
                what: "model output",
                got,
                expected: "rank 2".into(),
            })
    }

    fn backward(&mut self, d: Array2<f32>, device: &Device) -> Result<()> {
        let mut d = d.into_dyn();

        for (layer, (params, grad)) in self.layers.iter_mut().rev().zip(self.params.back()) {
            d = layer.backward(params, grad, d, device)?;
        }

        Ok(())
    }

    fn zero_grad(&mut self) {
        self.params.zero_grad();
    }

    fn params(&self) -> &[f32] {
        self.params.params()
    }

    fn grad(&self) -> &[f32] {
        self.params.grad()
    }

    fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()> {
        self.params.optimize(optimizer)
    }
}

use ndarray::ArrayD;

use super::{Conv2d, Dense, Dropout, Flatten, MaxPool2d, ReLU};
use crate::{Device, ExecutionContext, Result};

/// Every kind of layer a model can be built from. The parameterized ones work on the slice of
/// the model's parameters they are handed, the rest have no parameters at all.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    ReLU(ReLU),
    Dropout(Dropout),
    Flatten(Flatten),
}

impl Layer {
    pub fn dense(dim: (usize, usize)) -> Self {
        Self::Dense(Dense::new(dim))
    }

    /// A 3x3 (or any odd `kernel`) convolution that keeps the plane size.
    pub fn conv2d(channels: (usize, usize), kernel: usize) -> Self {
        Self::Conv2d(Conv2d::same(channels, kernel))
    }

    pub fn max_pool(size: usize) -> Self {
        Self::MaxPool2d(MaxPool2d::new(size))
    }

    pub fn relu() -> Self {
        Self::ReLU(ReLU::new())
    }

    pub fn dropout(p: f32) -> Result<Self> {
        Ok(Self::Dropout(Dropout::new(p)?))
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    /// Returns the amount of parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::Conv2d(l) => l.size(),
            Self::MaxPool2d(_) | Self::ReLU(_) | Self::Dropout(_) | Self::Flatten(_) => 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "dense",
            Self::Conv2d(_) => "conv2d",
            Self::MaxPool2d(_) => "max_pool",
            Self::ReLU(_) => "relu",
            Self::Dropout(_) => "dropout",
            Self::Flatten(_) => "flatten",
        }
    }

    /// The name and shape of each parameter tensor, in the order they are laid out.
    pub fn param_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        match self {
            Self::Dense(l) => l.param_shapes(),
            Self::Conv2d(l) => l.param_shapes(),
            _ => Vec::new(),
        }
    }

    /// Writes the initial values of this layer's parameters.
    pub fn init(&self, params: &mut [f32], ctx: &mut ExecutionContext) -> Result<()> {
        match self {
            Self::Dense(l) => l.init(params, ctx),
            Self::Conv2d(l) => l.init(params, ctx),
            _ => Ok(()),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayD<f32>,
        ctx: &mut ExecutionContext,
    ) -> Result<ArrayD<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x, ctx),
            Self::Conv2d(l) => l.forward(params, x, ctx),
            Self::MaxPool2d(l) => l.forward(x, ctx),
            Self::ReLU(l) => Ok(l.forward(x, ctx)),
            Self::Dropout(l) => Ok(l.forward(x, ctx)),
            Self::Flatten(l) => l.forward(x, ctx),
        }
    }

    /// Propagates `d`, the derivative of the loss w.r.t. this layer's output, writing the
    /// derivative w.r.t. the parameters onto `grad`.
    ///
    /// # Returns
    /// The derivative of the loss w.r.t. this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
        device: &Device,
    ) -> Result<ArrayD<f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::Conv2d(l) => l.backward(params, grad, d, device),
            Self::MaxPool2d(l) => l.backward(d, device),
            Self::ReLU(l) => l.backward(d),
            Self::Dropout(l) => l.backward(d),
            Self::Flatten(l) => l.backward(d),
        }
    }
}

use ndarray::prelude::*;

use super::into_rank;
use crate::{Device, ExecutionContext, MlErr, Result};

/// Max pooling over non overlapping `size x size` windows. Trailing rows or columns that don't
/// fill a window are dropped.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    size: usize,

    // Forward metadata, the position of the maximum inside each window
    argmax: Option<Vec<Array3<usize>>>,
    in_dim: Option<(usize, usize, usize, usize)>,
}

impl MaxPool2d {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            argmax: None,
            in_dim: None,
        }
    }

    pub fn forward(&mut self, x: ArrayD<f32>, ctx: &ExecutionContext) -> Result<ArrayD<f32>> {
        let x: Array4<f32> = into_rank(x, "pool input")?;
        let (b, c, h, w) = x.dim();
        let (oh, ow) = (h / self.size, w / self.size);

        if oh == 0 || ow == 0 {
            return Err(MlErr::ShapeMismatch {
                what: "pool input",
                got: x.shape().to_vec(),
                expected: format!("planes of at least {0}x{0}", self.size),
            });
        }

        let size = self.size;
        let (planes, argmax): (Vec<_>, Vec<_>) = ctx
            .device()
            .map_samples(b, |i| pool_sample(x.index_axis(Axis(0), i), size))
            .into_iter()
            .unzip();

        let mut y = Array4::zeros((b, c, oh, ow));
        for (mut sample, plane) in y.outer_iter_mut().zip(planes) {
            sample.assign(&plane);
        }

        if ctx.mode().is_train() {
            self.argmax = Some(argmax);
            self.in_dim = Some(x.dim());
        } else {
            self.argmax = None;
            self.in_dim = None;
        }

        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>, device: &Device) -> Result<ArrayD<f32>> {
        let d: Array4<f32> = into_rank(d, "pool delta")?;
        let argmax = self.argmax.take().ok_or(MlErr::NoForwardCache("pool"))?;
        let in_dim = self.in_dim.take().ok_or(MlErr::NoForwardCache("pool"))?;

        let expected = (in_dim.0, in_dim.1, in_dim.2 / self.size, in_dim.3 / self.size);
        if d.dim() != expected {
            return Err(MlErr::ShapeMismatch {
                what: "pool delta",
                got: d.shape().to_vec(),
                expected: format!("{expected:?}"),
            });
        }

        let (_, c, h, w) = in_dim;
        let size = self.size;
        let planes = device.map_samples(in_dim.0, |i| {
            let mut dx = Array3::zeros((c, h, w));
            let d = d.index_axis(Axis(0), i);

            for ((ch, oy, ox), &at) in argmax[i].indexed_iter() {
                let (wy, wx) = (at / size, at % size);
                dx[[ch, oy * size + wy, ox * size + wx]] += d[[ch, oy, ox]];
            }

            dx
        });

        let mut dx = Array4::zeros(in_dim);
        for (mut sample, plane) in dx.outer_iter_mut().zip(planes) {
            sample.assign(&plane);
        }

        Ok(dx.into_dyn())
    }
}

/// Pools a single `(c, h, w)` sample, returning the pooled planes and the flat position of the
/// maximum inside each window.
fn pool_sample(x: ArrayView3<f32>, size: usize) -> (Array3<f32>, Array3<usize>) {
    let (c, h, w) = x.dim();
    let (oh, ow) = (h / size, w / size);
    let mut y = Array3::zeros((c, oh, ow));
    let mut argmax = Array3::zeros((c, oh, ow));

    for ((ch, oy, ox), out) in y.indexed_iter_mut() {
        let mut best = f32::NEG_INFINITY;
        let mut best_at = 0;

        for dy in 0..size {
            for dx in 0..size {
                let v = x[[ch, oy * size + dy, ox * size + dx]];
                if v > best || v.is_nan() {
                    best = v;
                    best_at = dy * size + dx;
                }
            }
        }

        *out = best;
        argmax[[ch, oy, ox]] = best_at;
    }

    (y, argmax)
}

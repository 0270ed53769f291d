use ndarray::{linalg, prelude::*};

use super::{init_uniform, into_rank, view_grad, view_params};
use crate::{Device, ExecutionContext, MlErr, Result};

/// A 2D convolution (cross-correlation) with unit stride and zero padding.
///
/// The parameter slice holds the kernels with shape `(out, in * k * k)` followed by the `out`
/// biases. Each sample is unrolled into a column matrix (im2col) so the convolution becomes a
/// single matrix product per sample.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    padding: usize,
    size: usize,

    // Forward metadata
    cols: Option<Vec<Array2<f32>>>,
    in_dim: Option<(usize, usize, usize, usize)>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `channels` - The input and output channel depths.
    /// * `kernel` - The side of the square kernel.
    /// * `padding` - The zeros added on every side of the input planes.
    pub fn new(channels: (usize, usize), kernel: usize, padding: usize) -> Self {
        let (in_channels, out_channels) = channels;

        Self {
            in_channels,
            out_channels,
            kernel,
            padding,
            size: out_channels * (in_channels * kernel * kernel + 1),
            cols: None,
            in_dim: None,
        }
    }

    /// Creates a new `Conv2d` whose output planes have the size of its input planes.
    pub fn same(channels: (usize, usize), kernel: usize) -> Self {
        Self::new(channels, kernel, kernel / 2)
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn param_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        let k = self.kernel;

        vec![
            ("weight", vec![self.out_channels, self.in_channels, k, k]),
            ("bias", vec![self.out_channels]),
        ]
    }

    pub fn init(&self, params: &mut [f32], ctx: &mut ExecutionContext) -> Result<()> {
        init_uniform(params, self.patch_len(), ctx)
    }

    /// The output dimensions for an input of shape `(b, c, h, w)`.
    pub fn output_dim(
        &self,
        (b, _, h, w): (usize, usize, usize, usize),
    ) -> (usize, usize, usize, usize) {
        let span = 2 * self.padding + 1;
        (
            b,
            self.out_channels,
            (h + span).saturating_sub(self.kernel),
            (w + span).saturating_sub(self.kernel),
        )
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayD<f32>,
        ctx: &ExecutionContext,
    ) -> Result<ArrayD<f32>> {
        let x: Array4<f32> = into_rank(x, "conv input")?;
        if x.dim().1 != self.in_channels {
            return Err(MlErr::ShapeMismatch {
                what: "conv input",
                got: x.shape().to_vec(),
                expected: format!("[_, {}, _, _]", self.in_channels),
            });
        }

        let (w, b) = view_params(params, self.weight_dim(), self.out_channels)?;
        let out_dim = self.output_dim(x.dim());
        let (_, _, oh, ow) = out_dim;

        // The unrolled samples are only kept around for the backward pass
        let train = ctx.mode().is_train();
        let (planes, cols): (Vec<_>, Vec<_>) = ctx
            .device()
            .map_samples(x.dim().0, |i| {
                let cols = im2col(x.index_axis(Axis(0), i), self.kernel, self.padding, (oh, ow));
                let mut z = Array2::zeros((self.out_channels, oh * ow));
                linalg::general_mat_mul(1.0, &w, &cols, 0.0, &mut z);
                z += &b.insert_axis(Axis(1));
                (z, train.then_some(cols))
            })
            .into_iter()
            .unzip();

        let mut y = Array4::zeros(out_dim);
        for (mut sample, z) in y.outer_iter_mut().zip(planes) {
            let z = z.into_shape_with_order((self.out_channels, oh, ow)).map_err(|_| {
                MlErr::SizeMismatch {
                    what: "conv output plane",
                    got: self.out_channels * oh * ow,
                    expected: sample.len(),
                }
            })?;
            sample.assign(&z);
        }

        if train {
            self.in_dim = Some(x.dim());
            self.cols = cols.into_iter().collect();
        } else {
            self.in_dim = None;
            self.cols = None;
        }

        Ok(y.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
        device: &Device,
    ) -> Result<ArrayD<f32>> {
        let d: Array4<f32> = into_rank(d, "conv delta")?;
        let cols = self.cols.take().ok_or(MlErr::NoForwardCache("conv"))?;
        let in_dim = self.in_dim.take().ok_or(MlErr::NoForwardCache("conv"))?;
        let (batch, out_channels, oh, ow) = d.dim();

        if batch != cols.len() || out_channels != self.out_channels {
            return Err(MlErr::ShapeMismatch {
                what: "conv delta",
                got: d.shape().to_vec(),
                expected: format!("{:?}", self.output_dim(in_dim)),
            });
        }

        let d = d.to_shape((batch, out_channels, oh * ow)).map_err(|_| MlErr::SizeMismatch {
            what: "conv delta",
            got: d.len(),
            expected: batch * out_channels * oh * ow,
        })?;

        let (mut dw, mut db) = view_grad(grad, self.weight_dim(), self.out_channels)?;
        dw.fill(0.);
        for (d_i, cols_i) in d.outer_iter().zip(&cols) {
            linalg::general_mat_mul(1.0, &d_i, &cols_i.t(), 1.0, &mut dw);
        }
        db.assign(&d.sum_axis(Axis(2)).sum_axis(Axis(0)));

        let (w, _) = view_params(params, self.weight_dim(), self.out_channels)?;
        let (_, _, h, wd) = in_dim;
        let planes = device.map_samples(batch, |i| {
            let dcols = w.t().dot(&d.index_axis(Axis(0), i));
            col2im(dcols.view(), (self.in_channels, h, wd), self.kernel, self.padding, (oh, ow))
        });

        let mut dx = Array4::zeros(in_dim);
        for (mut sample, plane) in dx.outer_iter_mut().zip(planes) {
            sample.assign(&plane);
        }

        Ok(dx.into_dyn())
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel * self.kernel
    }

    fn weight_dim(&self) -> (usize, usize) {
        (self.out_channels, self.patch_len())
    }
}

/// Unrolls every `k x k` patch of a `(c, h, w)` sample into a column, producing a matrix of
/// shape `(c * k * k, oh * ow)`.
fn im2col(x: ArrayView3<f32>, k: usize, pad: usize, (oh, ow): (usize, usize)) -> Array2<f32> {
    let (c, h, w) = x.dim();
    let mut cols = Array2::zeros((c * k * k, oh * ow));

    for ch in 0..c {
        for ky in 0..k {
            for kx in 0..k {
                let mut row = cols.row_mut((ch * k + ky) * k + kx);

                for oy in 0..oh {
                    let Some(iy) = (oy + ky).checked_sub(pad).filter(|&iy| iy < h) else {
                        continue;
                    };

                    for ox in 0..ow {
                        let Some(ix) = (ox + kx).checked_sub(pad).filter(|&ix| ix < w) else {
                            continue;
                        };

                        row[oy * ow + ox] = x[[ch, iy, ix]];
                    }
                }
            }
        }
    }

    cols
}

/// The adjoint of `im2col`: folds the columns back into a `(c, h, w)` sample, adding up the
/// contributions of overlapping patches.
fn col2im(
    cols: ArrayView2<f32>,
    (c, h, w): (usize, usize, usize),
    k: usize,
    pad: usize,
    (oh, ow): (usize, usize),
) -> Array3<f32> {
    let mut x = Array3::zeros((c, h, w));

    for ch in 0..c {
        for ky in 0..k {
            for kx in 0..k {
                let row = cols.row((ch * k + ky) * k + kx);

                for oy in 0..oh {
                    let Some(iy) = (oy + ky).checked_sub(pad).filter(|&iy| iy < h) else {
                        continue;
                    };

                    for ox in 0..ow {
                        let Some(ix) = (ox + kx).checked_sub(pad).filter(|&ix| ix < w) else {
                            continue;
                        };

                        x[[ch, iy, ix]] += row[oy * ow + ox];
                    }
                }
            }
        }
    }

    x
}

use std::{iter::Rev, mem, slice};

use crate::{MlErr, Result, optimization::Optimizer};

/// Owns the model's flat parameter and gradient buffers and hands out each layer's region of
/// them, in order when going forward and in reverse when going backward.
#[derive(Debug, Clone)]
pub struct ParamManager {
    params: Vec<f32>,
    grad: Vec<f32>,
    layer_sizes: Vec<usize>,
}

impl ParamManager {
    /// Creates a new `ParamManager` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layer_sizes` - The amount of parameters of each layer, in forward order.
    ///
    /// # Returns
    /// A new `ParamManager` instance.
    pub fn new(layer_sizes: Vec<usize>) -> Self {
        let size = layer_sizes.iter().sum();

        Self {
            params: vec![0.; size],
            grad: vec![0.; size],
            layer_sizes,
        }
    }

    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Creates a new `FrontIter` over the parameters of each layer, first layer first.
    pub fn front(&self) -> FrontIter<'_> {
        FrontIter {
            rest: &self.params,
            sizes: self.layer_sizes.iter(),
        }
    }

    /// Same as `front` but the regions can be written, used to initialize the layers.
    pub fn front_mut(&mut self) -> FrontIterMut<'_> {
        FrontIterMut {
            rest: &mut self.params,
            sizes: self.layer_sizes.iter(),
        }
    }

    /// Creates a new `BackIter` over the parameters and gradient of each layer, last layer
    /// first.
    pub fn back(&mut self) -> BackIter<'_> {
        BackIter {
            params: &self.params,
            grad: &mut self.grad,
            sizes: self.layer_sizes.iter().rev(),
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Applies the gradient onto the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    pub fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_params(&mut self.params, &self.grad)
    }

    /// Overwrites every parameter.
    ///
    /// # Returns
    /// An error if `values` doesn't hold exactly one value per parameter.
    pub fn load(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: values.len(),
                expected: self.params.len(),
            });
        }

        self.params.copy_from_slice(values);
        Ok(())
    }
}

/// Yields each layer's parameters, first layer first.
pub struct FrontIter<'pm> {
    rest: &'pm [f32],
    sizes: slice::Iter<'pm, usize>,
}

impl<'pm> Iterator for FrontIter<'pm> {
    type Item = &'pm [f32];

    fn next(&mut self) -> Option<Self::Item> {
        let n = *self.sizes.next()?;
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;

        Some(head)
    }
}

/// Yields each layer's parameters mutably, first layer first.
pub struct FrontIterMut<'pm> {
    rest: &'pm mut [f32],
    sizes: slice::Iter<'pm, usize>,
}

impl<'pm> Iterator for FrontIterMut<'pm> {
    type Item = &'pm mut [f32];

    fn next(&mut self) -> Option<Self::Item> {
        let n = *self.sizes.next()?;
        let (head, tail) = mem::take(&mut self.rest).split_at_mut(n);
        self.rest = tail;

        Some(head)
    }
}

/// Yields each layer's parameters along with its gradient region, last layer first.
pub struct BackIter<'pm> {
    params: &'pm [f32],
    grad: &'pm mut [f32],
    sizes: Rev<slice::Iter<'pm, usize>>,
}

impl<'pm> Iterator for BackIter<'pm> {
    type Item = (&'pm [f32], &'pm mut [f32]);

    fn next(&mut self) -> Option<Self::Item> {
        let n = *self.sizes.next()?;

        let (params, tail) = self.params.split_at(self.params.len() - n);
        self.params = params;

        let grad = mem::take(&mut self.grad);
        let at = grad.len() - n;
        let (head, grad_tail) = grad.split_at_mut(at);
        self.grad = head;

        Some((tail, grad_tail))
    }
}

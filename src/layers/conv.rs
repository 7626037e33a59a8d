//! The two line convolutions of the connectome network.
//!
//! A full-row kernel (`1 × R`) followed by a full-column kernel (`R × 1`)
//! factors a 2D convolution over the connectivity matrix into two cheap
//! passes. With valid padding both reduce to dense products:
//!
//! - the row convolution applies one shared `R × maps` weight to every matrix
//!   row, i.e. a dense layer over a `[batch * R, R]` view of the input;
//! - the column convolution sees the whole `R × maps` activation map at once,
//!   i.e. a dense layer over the flattened `[batch, R * maps]` view.
//!
//! Kernels are stored in the same element order as an `[kh, kw, in, out]`
//! tensor, the layout other frameworks use for 2D kernels.

use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    layers::dense::{Dense, LayerGradients},
    math::matrix::Matrix,
};

#[derive(Debug)]
pub struct RowConv {
    pub dense: Dense,
    num_roi: usize,
}

impl RowConv {
    pub const BIAS_INIT: f64 = 0.001;

    pub fn new<R: Rng + ?Sized>(num_roi: usize, maps: usize, rng: &mut R) -> RowConv {
        // receptive field 1 × R × 1 channel
        let fans = (num_roi, num_roi * maps);
        let dense = Dense::new(num_roi, maps, ActivationFunction::ReLU, Self::BIAS_INIT, fans, rng);
        RowConv { dense, num_roi }
    }

    pub fn from_dense(dense: Dense, num_roi: usize) -> RowConv {
        RowConv { dense, num_roi }
    }

    /// `[1, R, 1, maps]`
    pub fn kernel_shape(&self) -> Vec<usize> {
        vec![1, self.num_roi, 1, self.dense.size]
    }

    /// `[batch, R * R]` → `[batch, R * maps]`
    pub fn feed_from(&mut self, batch: &Matrix) -> Matrix {
        let n = batch.rows;
        let rows = batch.clone().reshape(n * self.num_roi, self.num_roi);
        self.dense.feed_from(rows).reshape(n, self.num_roi * self.dense.size)
    }

    pub fn infer(&self, batch: &Matrix) -> Matrix {
        let n = batch.rows;
        let rows = batch.clone().reshape(n * self.num_roi, self.num_roi);
        self.dense.infer(&rows).reshape(n, self.num_roi * self.dense.size)
    }

    /// `activation_grad` has the `[batch, R * maps]` output layout.
    pub fn compute_gradients(&self, activation_grad: &Matrix) -> LayerGradients {
        let n = activation_grad.rows;
        let per_row = activation_grad.clone().reshape(n * self.num_roi, self.dense.size);
        self.dense.compute_gradients(&per_row)
    }
}

#[derive(Debug)]
pub struct ColumnConv {
    pub dense: Dense,
    num_roi: usize,
    in_maps: usize,
}

impl ColumnConv {
    pub const BIAS_INIT: f64 = 0.001;

    pub fn new<R: Rng + ?Sized>(num_roi: usize, in_maps: usize, maps: usize, rng: &mut R) -> ColumnConv {
        // receptive field R × 1 × in_maps
        let fans = (num_roi * in_maps, num_roi * maps);
        let dense = Dense::new(num_roi * in_maps, maps, ActivationFunction::ReLU, Self::BIAS_INIT, fans, rng);
        ColumnConv { dense, num_roi, in_maps }
    }

    pub fn from_dense(dense: Dense, num_roi: usize, in_maps: usize) -> ColumnConv {
        ColumnConv { dense, num_roi, in_maps }
    }

    /// `[R, 1, in_maps, maps]`
    pub fn kernel_shape(&self) -> Vec<usize> {
        vec![self.num_roi, 1, self.in_maps, self.dense.size]
    }

    /// `[batch, R * in_maps]` → `[batch, maps]`
    pub fn feed_from(&mut self, maps: Matrix) -> Matrix {
        self.dense.feed_from(maps)
    }

    pub fn infer(&self, maps: &Matrix) -> Matrix {
        self.dense.infer(maps)
    }

    pub fn compute_gradients(&self, activation_grad: &Matrix) -> LayerGradients {
        self.dense.compute_gradients(activation_grad)
    }

    /// ∂L/∂a of the row convolution, in its `[batch, R * in_maps]` layout.
    pub fn propagate(&self, delta: &Matrix) -> Matrix {
        self.dense.propagate(delta)
    }
}

use rand::Rng;

use crate::math::matrix::{hadamard, Matrix};

/// Inverted dropout mask: kept units are scaled by `1 / keep_probability`
/// so that no rescaling is needed at evaluation time.
#[derive(Debug, Clone)]
pub struct DropoutMask {
    scale: Matrix,
}

impl DropoutMask {
    /// Draws a fresh mask. Returns `None` when `keep_probability >= 1`, in
    /// which case dropout is the identity.
    pub fn sample<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        keep_probability: f64,
        rng: &mut R,
    ) -> Option<DropoutMask> {
        if keep_probability >= 1.0 {
            return None;
        }
        let kept = 1.0 / keep_probability;
        let data = (0..rows * cols)
            .map(|_| if rng.gen::<f64>() < keep_probability { kept } else { 0.0 })
            .collect();
        Some(DropoutMask { scale: Matrix::from_vec(rows, cols, data) })
    }

    pub fn apply(&self, activations: &Matrix) -> Matrix {
        hadamard(activations, &self.scale)
    }
}

/// Applies an optional mask; gradients flow back through the same mask.
pub fn apply_mask(mask: Option<&DropoutMask>, values: Matrix) -> Matrix {
    match mask {
        Some(mask) => mask.apply(&values),
        None => values,
    }
}

use crate::math::matrix::Matrix;

/// A weight or bias tensor together with its trainability.
///
/// Frozen parameters are constants: the optimizer never touches them and the
/// backward pass does not compute their gradients.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Matrix,
    pub frozen: bool,
}

impl Param {
    pub fn trainable(value: Matrix) -> Param {
        Param { value, frozen: false }
    }

    pub fn frozen(value: Matrix) -> Param {
        Param { value, frozen: true }
    }
}
